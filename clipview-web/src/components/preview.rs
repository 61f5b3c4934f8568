//! Preview area, action bar and customise-link overlay

use clipview_core::actions::ActionTrigger;
use clipview_core::player::engine::escape_html;
use clipview_core::{PreviewView, ResolvedResources, ResourceMenu};

/// Milliseconds between polls while the demuxer loads.
const LOADING_POLL_DELAY_MS: u64 = 500;

/// Query string naming `path` and, when present, its access token.
fn file_query(path: &str, token: Option<&str>) -> String {
    let mut query = format!("path={}", urlencoding::encode(path));
    if let Some(token) = token.filter(|token| !token.is_empty()) {
        query.push_str("&odpt=");
        query.push_str(&urlencoding::encode(token));
    }
    query
}

/// Renders the preview area of `path` for the current view.
///
/// The loading view polls `/htmx/preview/player` for the same file and is
/// replaced by the player or the error once the demuxer settles.
pub fn preview_area(view: &PreviewView, path: &str) -> String {
    match view {
        PreviewView::Loading { text } => format!(
            r#"<div id="preview-area" data-view="loading" hx-get="/htmx/preview/player?{query}" hx-trigger="load delay:{LOADING_POLL_DELAY_MS}ms" hx-swap="outerHTML">
                <div class="flex items-center justify-center h-64 text-gray-400">
                    <div class="w-6 h-6 mr-3 border-2 border-gray-500 border-t-transparent rounded-full animate-spin"></div>
                    <span>{}</span>
                </div>
            </div>"#,
            escape_html(text),
            query = file_query(path, None)
        ),
        PreviewView::Error { message } => format!(
            r#"<div id="preview-area" data-view="error">
                <div class="flex items-center justify-center h-64 bg-red-900 bg-opacity-30 border border-red-700 rounded-lg">
                    <span class="text-red-300">{}</span>
                </div>
            </div>"#,
            escape_html(message)
        ),
        PreviewView::Player { markup } => format!(
            r#"<div id="preview-area" data-view="player">
                {markup}
            </div>"#
        ),
    }
}

/// Renders the action controls beneath the player.
///
/// Server-side actions carry `token` so they resolve the same links the
/// player was given.
pub fn action_bar(triggers: &[ActionTrigger], path: &str, token: Option<&str>) -> String {
    let query = escape_html(&file_query(path, token));
    let menu_query = escape_html(&file_query(path, None));
    let mut primary = Vec::new();
    let mut players = Vec::new();

    for trigger in triggers {
        match trigger {
            ActionTrigger::Download { url } => primary.push(format!(
                r#"<a href="{}" target="_blank" rel="noopener" class="btn-action" data-action="download">Download</a>"#,
                escape_html(url)
            )),
            ActionTrigger::AlternateDownload { .. } => primary.push(format!(
                r#"<a href="/api/download/alternate?{query}" target="_blank" rel="noopener" class="btn-action" data-action="alternate_download">Alternate Download</a>"#
            )),
            ActionTrigger::CopyDirectLink { .. } => primary.push(format!(
                r#"<button hx-post="/htmx/preview/copy-link?{query}" hx-swap="none" class="btn-action" data-action="copy_direct_link">Copy direct link</button>"#
            )),
            ActionTrigger::CustomiseLink => primary.push(format!(
                r##"<button hx-post="/htmx/preview/menu?{menu_query}" hx-target="#customise-link" hx-swap="outerHTML" class="btn-action" data-action="customise_link">Customise link</button>"##
            )),
            ActionTrigger::ExternalPlayer { player, label, uri } => players.push(format!(
                r#"<a href="{}" class="flex items-center space-x-2 text-sm text-gray-300 hover:text-white" data-action="external_player">
                    <img src="{}" alt="{label}" class="w-5 h-5">
                    <span>{label}</span>
                </a>"#,
                escape_html(uri),
                player.icon()
            )),
        }
    }

    format!(
        r#"<div class="flex flex-wrap gap-3 mt-4">{}</div>
        <div class="flex flex-wrap gap-4 mt-4">{}</div>"#,
        primary.join(""),
        players.join("")
    )
}

/// Renders the customise-link overlay of `path`, or its empty anchor when closed.
pub fn customise_link_menu(menu: ResourceMenu, resources: &ResolvedResources, path: &str) -> String {
    let menu_query = escape_html(&file_query(path, None));
    match menu {
        ResourceMenu::Closed => r#"<div id="customise-link" data-menu="closed"></div>"#.to_string(),
        ResourceMenu::Open => {
            let link = escape_html(&resources.direct_download_url);
            let encoded = urlencoding::encode(&resources.direct_download_url);
            format!(
                r##"<div id="customise-link" data-menu="open" class="fixed inset-0 z-40 flex items-center justify-center bg-black bg-opacity-60">
                    <div class="bg-gray-800 border border-gray-700 rounded-lg p-6 w-full max-w-xl space-y-4">
                        <h3 class="text-lg font-semibold text-white">Customise link</h3>
                        <label class="block text-sm text-gray-400">Direct link
                            <input readonly value="{link}" class="w-full mt-1 p-2 bg-gray-900 border border-gray-700 rounded text-white">
                        </label>
                        <label class="block text-sm text-gray-400">URL encoded
                            <input readonly value="{encoded}" class="w-full mt-1 p-2 bg-gray-900 border border-gray-700 rounded text-white">
                        </label>
                        <button hx-post="/htmx/preview/menu?{menu_query}" hx-target="#customise-link" hx-swap="outerHTML" class="btn-action">Close</button>
                    </div>
                </div>"##
            )
        }
    }
}

/// Unmounts the preview of `path` when the page goes away for good.
pub fn unmount_on_pagehide(path: &str) -> String {
    format!(
        r#"<script>
    window.addEventListener('pagehide', function (event) {{
        if (event.persisted) return;
        fetch('/api/preview?{query}', {{ method: 'DELETE', keepalive: true }});
    }});
</script>"#,
        query = file_query(path, None)
    )
}
