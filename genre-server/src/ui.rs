//! Embedded upload page served at `/`.

use axum::response::Html;

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Music Genre Classifier</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 36rem; margin: 3rem auto; padding: 0 1rem; }
  #result { margin-top: 1.5rem; font-size: 1.1rem; }
  .error { color: #b00020; }
</style>
</head>
<body>
<h1>Music Genre Classifier</h1>
<p>Upload a song (mp3, wav, flac, ogg) to predict its genre.</p>
<form id="upload">
  <input type="file" id="file" name="file" accept=".mp3,.wav,.flac,.ogg,audio/*" required>
  <button type="submit">Predict</button>
</form>
<div id="result"></div>
<script>
const form = document.getElementById("upload");
const result = document.getElementById("result");

function title(label) {
  return label.charAt(0).toUpperCase() + label.slice(1);
}

form.addEventListener("submit", async (event) => {
  event.preventDefault();
  const file = document.getElementById("file").files[0];
  if (!file) return;
  const body = new FormData();
  body.append("file", file, file.name);
  result.className = "";
  result.textContent = "Classifying...";
  try {
    const resp = await fetch("/predict", { method: "POST", body });
    let data = null;
    try { data = await resp.json(); } catch (_) {}
    if (resp.ok && data) {
      result.innerHTML = "";
      const genre = document.createElement("p");
      genre.innerHTML = "Predicted Genre: <strong></strong>";
      genre.querySelector("strong").textContent = title(data.predicted_genre);
      const conf = document.createElement("p");
      conf.textContent = "Confidence: " + (data.confidence * 100).toFixed(1) + "%";
      result.append(genre, conf);
    } else if (data && data.error) {
      result.className = "error";
      result.textContent = "Error: " + data.error;
    } else {
      result.className = "error";
      result.textContent = "Backend error: " + resp.status;
    }
  } catch (err) {
    result.className = "error";
    result.textContent = "Backend error: " + err;
  }
});
</script>
</body>
</html>
"#;
