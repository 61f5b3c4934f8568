//! Toast notifications

/// Renders a dismissible toast, swapped out-of-band into `#toasts`.
pub fn notification_toast(message: &str, toast_type: &str) -> String {
    let (bg_class, border_class, icon) = match toast_type {
        "success" => ("bg-green-800", "border-green-600", "✓"),
        "error" => ("bg-red-800", "border-red-600", "✗"),
        _ => ("bg-gray-800", "border-gray-600", "•"),
    };

    format!(
        r#"<div hx-swap-oob="beforeend:#toasts"><div class="flex items-center p-4 border rounded-lg {bg_class} {border_class}" data-toast="{toast_type}">
            <span class="mr-3">{icon}</span>
            <span class="flex-1 text-sm text-white">{message}</span>
            <button class="ml-4 text-gray-400 hover:text-white" onclick="this.parentElement.remove()">✕</button>
        </div></div>"#
    )
}
