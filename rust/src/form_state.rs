use serde::{Deserialize, Serialize};

use crate::generation_client::GenerationRequest;
use crate::presets::{clamp_dimension, clamp_steps, find_preset, DEFAULT_ASPECT_RATIO};

pub const DEFAULT_PROMPT: &str = "一张虚构的英语电影《回忆之味》（The Taste of Memory）的电影海报。场景设置在一个质朴的19世纪风格厨房里。画面中央，一位红棕色头发、留着小胡子的中年男子（演员阿瑟·彭哈利根饰）站在一张木桌后，他身穿白色衬衫、黑色马甲和米色围裙，正看着一位女士，手中拿着一大块生红肉，下方是一个木制切菜板。在他的右边，一位梳着高髻的黑发女子（演员埃莉诺·万斯饰）倚靠在桌子上，温柔地对他微笑。她穿着浅色衬衫和一条上白下蓝的长裙。桌上除了放有切碎的葱和卷心菜丝的切菜板外，还有一个白色陶瓷盘、新鲜香草，左侧一个木箱上放着一串深色葡萄。背景是一面粗糙的灰白色抹灰墙，墙上挂着一幅风景画。最右边的一个台面上放着一盏复古油灯。海报上有大量的文字信息。左上角是白色的无衬线字体\"ARTISAN FILMS PRESENTS\"，其下方是\"ELEANOR VANCE\"和\"ACADEMY AWARD® WINNER\"。右上角写着\"ARTHUR PENHALIGON\"和\"GOLDEN GLOBE® AWARD WINNER\"。顶部中央是圣丹斯电影节的桂冠标志，下方写着\"SUNDANCE FILM FESTIVAL GRAND JURY PRIZE 2024\"。主标题\"THE TASTE OF MEMORY\"以白色的大号衬线字体醒目地显示在下半部分。标题下方注明了\"A FILM BY Tongyi Interaction Lab\"。底部区域用白色小字列出了完整的演职员名单，包括\"SCREENPLAY BY ANNA REID\"、\"CULINARY DIRECTION BY JAMES CARTER\"以及Artisan Films、Riverstone Pictures和Heritage Media等众多出品公司标志。整体风格是写实主义，采用温暖柔和的灯光方案，营造出一种亲密的氛围。色调以棕色、米色和柔和的绿色等大地色系为主。两位演员的身体都在腰部被截断";
pub const DEFAULT_NEGATIVE_PROMPT: &str = "低质量, 丑陋, 畸形, 模糊, 多余的肢体, 错误的文本";
pub const DEFAULT_MODEL: &str = "z-image-turbo";
pub const DEFAULT_STEPS: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormState {
    pub prompt: String,
    pub negative_prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub aspect_ratio: String,
    pub high_resolution: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FormEdit {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub model: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub steps: Option<i64>,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            negative_prompt: DEFAULT_NEGATIVE_PROMPT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            width: 1024,
            height: 1024,
            steps: DEFAULT_STEPS,
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            high_resolution: false,
        }
    }
}

impl FormState {
    pub fn apply_edit(&mut self, edit: FormEdit) {
        if let Some(prompt) = edit.prompt {
            self.prompt = prompt;
        }
        if let Some(negative_prompt) = edit.negative_prompt {
            self.negative_prompt = negative_prompt;
        }
        if let Some(model) = edit.model {
            self.model = model.trim().to_string();
        }
        // Manual slider values override the preset; the ratio label is kept.
        if let Some(width) = edit.width {
            self.width = clamp_dimension(width);
        }
        if let Some(height) = edit.height {
            self.height = clamp_dimension(height);
        }
        if let Some(steps) = edit.steps {
            self.steps = clamp_steps(steps);
        }
    }

    pub fn select_aspect_ratio(&mut self, label: &str) -> bool {
        let Some(preset) = find_preset(label) else {
            return false;
        };
        self.aspect_ratio = preset.label.to_string();
        (self.width, self.height) = preset.dimensions(self.high_resolution);
        true
    }

    pub fn set_high_resolution(&mut self, enabled: bool) {
        self.high_resolution = enabled;
        if let Some(preset) = find_preset(&self.aspect_ratio) {
            (self.width, self.height) = preset.dimensions(enabled);
        }
    }

    pub fn normalized(mut self) -> Self {
        self.width = clamp_dimension(i64::from(self.width));
        self.height = clamp_dimension(i64::from(self.height));
        self.steps = clamp_steps(i64::from(self.steps));
        if find_preset(&self.aspect_ratio).is_none() {
            self.aspect_ratio = DEFAULT_ASPECT_RATIO.to_string();
        }
        if self.model.trim().is_empty() {
            self.model = DEFAULT_MODEL.to_string();
        }
        self
    }

    pub fn to_request(&self) -> GenerationRequest {
        GenerationRequest {
            prompt: self.prompt.clone(),
            negative_prompt: self.negative_prompt.clone(),
            model: self.model.clone(),
            width: self.width,
            height: self.height,
            steps: self.steps,
        }
    }
}
