//! Static HTML page that bounces back to the mod's catalog page.

/// File name written inside the install directory.
pub const REDIRECT_FILE_NAME: &str = "open_mod_page.html";

/// Local time as `YYYY-MM-DD-HH-MM-SS`.
pub(crate) fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string()
}

pub fn render_redirect(source_url: &str, name: &str, title: &str, created_at: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <meta http-equiv="refresh" content="0; url={source_url}">
  <title>Redirecting...</title>
  <link rel="canonical" href="{source_url}">
</head>
<body>
  <p id="createdAt-{created_at}">If you are not redirected automatically, follow this <a href="{source_url}">link to {name} ({title})</a>.</p>
</body>
</html>
"#
    )
}
