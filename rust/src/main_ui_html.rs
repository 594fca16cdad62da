const ENDPOINT_PLACEHOLDER: &str = "__GENERATE_ENDPOINT__";

pub fn build_main_ui_html(endpoint: &str) -> String {
    let escaped = html_escape::encode_text(endpoint);
    MAIN_UI_HTML.replace(ENDPOINT_PLACEHOLDER, &escaped)
}

const MAIN_UI_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>Image Generator</title>
  <style>
    :root {
      --bg: #1f2024;
      --panel: #1b1c20;
      --line: #3f4248;
      --input-bg: #272a2f;
      --input-line: #4a4e55;
      --text: #f3f5f7;
      --muted: #9ca2ad;
      --btn-bg: #2a2d33;
      --btn-line: #5b616d;
      --accent: #4c7dff;
      --error: #ff6b6b;
      --ok: #49c27a;
      --font-sm: 12px;
    }
    * { box-sizing: border-box; }
    body {
      margin: 0;
      color: var(--text);
      background: var(--bg);
      font-family: "Segoe UI", "Helvetica Neue", sans-serif;
      font-size: 14px;
    }
    .wrap {
      display: grid;
      grid-template-columns: 380px 1fr;
      gap: 10px;
      height: 100vh;
      padding: 10px;
    }
    .panel {
      background: var(--panel);
      border: 1px solid var(--line);
      border-radius: 6px;
      padding: 10px;
      overflow: auto;
    }
    header {
      font-size: var(--font-sm);
      color: var(--muted);
      margin-bottom: 8px;
      word-break: break-all;
    }
    label {
      display: block;
      margin: 10px 0 4px;
      color: var(--muted);
      font-size: var(--font-sm);
    }
    input[type="text"], input[type="password"], textarea, select {
      width: 100%;
      padding: 6px 8px;
      color: var(--text);
      background: var(--input-bg);
      border: 1px solid var(--input-line);
      border-radius: 4px;
      font: inherit;
    }
    textarea { resize: vertical; min-height: 64px; }
    input[type="range"] { width: 100%; }
    .row { display: flex; gap: 6px; align-items: center; }
    .row > input[type="password"] { flex: 1; }
    button {
      padding: 6px 12px;
      color: var(--text);
      background: var(--btn-bg);
      border: 1px solid var(--btn-line);
      border-radius: 4px;
      cursor: pointer;
      font: inherit;
    }
    button:disabled { opacity: 0.6; cursor: default; }
    #generate {
      width: 100%;
      margin-top: 14px;
      padding: 10px;
      background: var(--accent);
      border-color: var(--accent);
      font-weight: 600;
    }
    .check { display: flex; gap: 6px; align-items: center; margin-top: 10px; }
    .viewer { display: grid; grid-template-rows: 1fr auto; gap: 10px; }
    #image {
      display: flex;
      align-items: center;
      justify-content: center;
      min-height: 320px;
      color: var(--muted);
    }
    #image img { max-width: 100%; max-height: 70vh; border-radius: 4px; }
    #image .error { color: var(--error); white-space: pre-wrap; }
    #download { display: none; margin-top: 6px; font-size: var(--font-sm); color: var(--accent); }
    #status {
      margin: 0;
      min-height: 64px;
      padding: 8px;
      background: var(--input-bg);
      border: 1px solid var(--input-line);
      border-radius: 4px;
      font-family: Consolas, monospace;
      font-size: var(--font-sm);
      white-space: pre-wrap;
    }
    #elapsed { color: var(--muted); font-size: var(--font-sm); margin-top: 4px; }
    #toast {
      position: fixed;
      right: 16px;
      bottom: 16px;
      padding: 8px 14px;
      border-radius: 4px;
      background: var(--btn-bg);
      border: 1px solid var(--btn-line);
      opacity: 0;
      transition: opacity 0.2s;
      pointer-events: none;
    }
    #toast.show { opacity: 1; }
    #toast.success { border-color: var(--ok); }
    #toast.error { border-color: var(--error); }
  </style>
</head>
<body>
  <div class="wrap">
    <div class="panel">
      <header>Endpoint: __GENERATE_ENDPOINT__</header>

      <label for="apiKey">API Key</label>
      <div class="row">
        <input id="apiKey" type="password" autocomplete="off" />
        <button id="clearKey" type="button">Clear</button>
      </div>

      <label for="prompt">Prompt</label>
      <textarea id="prompt" rows="5"></textarea>

      <label for="negativePrompt">Negative prompt</label>
      <textarea id="negativePrompt" rows="3"></textarea>

      <label for="model">Model</label>
      <input id="model" type="text" />

      <label for="steps">Steps: <span id="stepsValue"></span></label>
      <input id="steps" type="range" min="1" max="50" step="1" />

      <label for="aspectRatio">Aspect ratio</label>
      <select id="aspectRatio"></select>
      <div class="check">
        <input id="highRes" type="checkbox" />
        <label for="highRes" style="margin:0">High resolution</label>
      </div>

      <label for="width">Width: <span id="widthValue"></span></label>
      <input id="width" type="range" min="512" max="2048" step="64" />

      <label for="height">Height: <span id="heightValue"></span></label>
      <input id="height" type="range" min="512" max="2048" step="64" />

      <button id="generate" type="button">Generate</button>
    </div>

    <div class="panel viewer">
      <div>
        <div id="image">No image yet</div>
        <a id="download" download="generated-image">Download</a>
      </div>
      <div>
        <pre id="status"></pre>
        <div id="elapsed"></div>
      </div>
    </div>
  </div>
  <div id="toast"></div>

  <script>
    const state = {
      phase: "idle",
      form: null,
      result: null,
      startedAt: null,
      lastElapsedMs: null,
      busy: false,
    };
    let toastTimer = null;
    let pollTimer = null;

    function showToast(level, message) {
      const toast = document.getElementById("toast");
      toast.textContent = message;
      toast.className = `show ${level}`;
      if (toastTimer) {
        clearTimeout(toastTimer);
      }
      toastTimer = setTimeout(() => {
        toast.className = "";
        toastTimer = null;
      }, 2500);
    }

    function showNotices(payload) {
      for (const notice of payload.notices || []) {
        showToast(notice.level, notice.message);
      }
    }

    async function apiGet(path) {
      const res = await fetch(path, { method: "GET" });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    async function apiPost(path, body) {
      const res = await fetch(path, {
        method: "POST",
        headers: { "Content-Type": "application/json" },
        body: JSON.stringify(body || {}),
      });
      const data = await res.json();
      if (!res.ok || !data.ok) {
        throw new Error(data.error || "request failed");
      }
      return data;
    }

    function applySnapshot(payload) {
      state.phase = payload.phase || "idle";
      state.form = payload.form || state.form;
      state.result = payload.result || null;
      state.lastElapsedMs = payload.last_elapsed_ms ?? null;
      state.startedAt = typeof payload.elapsed_ms === "number"
        ? Date.now() - payload.elapsed_ms
        : null;
      document.getElementById("status").textContent = payload.status || "";
      render();
      showNotices(payload);
      schedulePoll();
    }

    function setValue(id, value) {
      const el = document.getElementById(id);
      if (document.activeElement !== el) {
        el.value = value;
      }
    }

    function render() {
      const form = state.form;
      if (form) {
        setValue("prompt", form.prompt);
        setValue("negativePrompt", form.negative_prompt);
        setValue("model", form.model);
        setValue("steps", form.steps);
        setValue("width", form.width);
        setValue("height", form.height);
        document.getElementById("aspectRatio").value = form.aspect_ratio;
        document.getElementById("highRes").checked = !!form.high_resolution;
        renderSliderLabels();
      }

      const loading = state.busy || state.phase === "submitting";
      const button = document.getElementById("generate");
      button.disabled = loading;
      button.textContent = loading ? "Generating..." : "Generate";

      const image = document.getElementById("image");
      const download = document.getElementById("download");
      image.innerHTML = "";
      download.style.display = "none";
      if (state.result && state.result.imageUrl) {
        const img = document.createElement("img");
        img.src = state.result.imageUrl;
        img.alt = "Generated image";
        image.appendChild(img);
        download.href = state.result.imageUrl;
        download.style.display = "inline-block";
      } else if (state.result && state.result.imageError) {
        const err = document.createElement("div");
        err.className = "error";
        err.textContent = state.result.imageError;
        image.appendChild(err);
      } else {
        image.textContent = loading ? "Generating..." : "No image yet";
      }
      renderElapsed();
    }

    function renderSliderLabels() {
      document.getElementById("stepsValue").textContent = document.getElementById("steps").value;
      document.getElementById("widthValue").textContent = document.getElementById("width").value;
      document.getElementById("heightValue").textContent = document.getElementById("height").value;
    }

    function renderElapsed() {
      const el = document.getElementById("elapsed");
      if (state.startedAt !== null) {
        el.textContent = `Elapsed: ${((Date.now() - state.startedAt) / 1000).toFixed(1)}s`;
      } else if (state.lastElapsedMs !== null) {
        el.textContent = `Last generation took ${(state.lastElapsedMs / 1000).toFixed(1)}s`;
      } else {
        el.textContent = "";
      }
    }

    function schedulePoll() {
      if (pollTimer) {
        clearTimeout(pollTimer);
        pollTimer = null;
      }
      if (state.phase === "submitting" && !state.busy) {
        pollTimer = setTimeout(async () => {
          try {
            applySnapshot(await apiGet("/app/state"));
          } catch (err) {
            showToast("error", err.message);
          }
        }, 1000);
      }
    }

    async function post(path, body) {
      try {
        applySnapshot(await apiPost(path, body));
      } catch (err) {
        showToast("error", err.message);
      }
    }

    function fillPresets(presets) {
      const select = document.getElementById("aspectRatio");
      select.innerHTML = "";
      for (const preset of presets || []) {
        const option = document.createElement("option");
        option.value = preset.label;
        option.textContent = preset.label;
        select.appendChild(option);
      }
    }

    async function init() {
      try {
        const data = await apiGet("/app/init");
        fillPresets(data.presets);
        document.getElementById("apiKey").value = data.api_key || "";
        applySnapshot(data);
      } catch (err) {
        document.getElementById("status").textContent = `Startup error: ${err.message}`;
      }
    }

    document.getElementById("apiKey").addEventListener("change", (e) => {
      post("/app/api-key", { api_key: e.target.value });
    });

    document.getElementById("clearKey").addEventListener("click", () => {
      document.getElementById("apiKey").value = "";
      post("/app/api-key/clear", {});
    });

    for (const [id, field] of [["prompt", "prompt"], ["negativePrompt", "negative_prompt"], ["model", "model"]]) {
      document.getElementById(id).addEventListener("change", (e) => {
        post("/app/form", { [field]: e.target.value });
      });
    }

    for (const id of ["steps", "width", "height"]) {
      const el = document.getElementById(id);
      el.addEventListener("input", renderSliderLabels);
      el.addEventListener("change", (e) => {
        post("/app/form", { [id]: Number(e.target.value) });
      });
    }

    document.getElementById("aspectRatio").addEventListener("change", (e) => {
      post("/app/aspect-ratio", { ratio: e.target.value });
    });

    document.getElementById("highRes").addEventListener("change", (e) => {
      post("/app/high-resolution", { enabled: e.target.checked });
    });

    document.getElementById("generate").addEventListener("click", async () => {
      const active = document.activeElement;
      if (active && typeof active.blur === "function") {
        active.blur();
      }
      state.busy = true;
      state.startedAt = Date.now();
      state.result = null;
      render();
      try {
        const apiKey = document.getElementById("apiKey").value;
        const data = await apiPost("/app/generate", { api_key: apiKey });
        state.busy = false;
        applySnapshot(data);
      } catch (err) {
        state.busy = false;
        state.startedAt = null;
        render();
        showToast("error", err.message);
      }
    });

    setInterval(renderElapsed, 100);
    init();
  </script>
</body>
</html>
"#;
