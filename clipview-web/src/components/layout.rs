//! Page shell and player asset includes

use clipview_core::player::engine::escape_html;

/// Renders a complete page around `content`.
///
/// Pulls in HTMX, both player engines and the danmaku plugin, and listens
/// for the `copyDirectLink` event the copy-link handler triggers so the link
/// lands on the client clipboard.
pub fn page_shell(title: &str, content: &str) -> String {
    let title = escape_html(title);
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title} - Clipview</title>
    <script src="https://unpkg.com/htmx.org@1.9.10"></script>
    <script src="https://cdn.tailwindcss.com"></script>
    <link rel="stylesheet" href="https://cdn.plyr.io/3.7.8/plyr.css">
    <script src="https://cdn.plyr.io/3.7.8/plyr.polyfilled.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/artplayer@5.1.1/dist/artplayer.js"></script>
    <script src="https://cdn.jsdelivr.net/npm/artplayer-plugin-danmuku@5.0.1/dist/artplayer-plugin-danmuku.js"></script>
    <script>
        document.addEventListener('copyDirectLink', (event) => {{
            navigator.clipboard.writeText(event.detail.link);
        }});
    </script>
</head>
<body class="bg-gray-900 text-white">
    <main class="max-w-5xl mx-auto px-4 py-8">
        {content}
    </main>
    <div id="toasts" class="fixed bottom-4 right-4 space-y-2 z-50"></div>
</body>
</html>"##
    )
}

/// Renders the file header shown above the preview.
pub fn file_header(name: &str, path: &str) -> String {
    let name = escape_html(name);
    let path = escape_html(path);
    format!(
        r#"<div class="mb-6">
            <h1 class="text-2xl font-bold text-white truncate">{name}</h1>
            <p class="text-gray-400 text-sm mt-1 truncate">{path}</p>
        </div>"#
    )
}

/// Renders a card container.
pub fn card(content: &str) -> String {
    format!(
        r#"<div class="bg-gray-800 border border-gray-700 rounded-lg p-4 mb-6">
            {content}
        </div>"#
    )
}
