//! Static result pages the hosted checkout redirects back to

use std::collections::HashMap;

use axum::{extract::Query, response::Html};

/// Render the post-payment page. Purely a display, no API is called.
///
/// The query is read as a plain map so repeated or unexpected parameters
/// never reject the request, the last `session_id` wins.
pub async fn success_page(Query(mut query): Query<HashMap<String, String>>) -> Html<String> {
    let reference = query
        .remove("session_id")
        .filter(|id| !id.is_empty())
        .map(|id| {
            format!(
                r#"<p class="reference">Order reference: <code>{}</code></p>"#,
                escape_html(&id)
            )
        })
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Payment Successful</title>
</head>
<body>
<main>
<h1>Payment Successful!</h1>
<p>Thank you for your purchase. You will receive an email confirmation shortly.</p>
{reference}
<h2>What's Next?</h2>
<ul>
<li>Check your email for access instructions</li>
<li>Visit your dashboard to access your purchased tools</li>
<li>Contact support if you need any assistance</li>
</ul>
<p><a href="/dashboard">Go to Dashboard</a> | <a href="/marketplace">Back to Marketplace</a></p>
</main>
</body>
</html>
"#
    ))
}

/// Render the cancelled-payment page, which sends the visitor home after 5 seconds
pub async fn cancel_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="5;url=/">
<title>Payment Cancelled</title>
</head>
<body>
<main>
<h1>Payment Cancelled</h1>
<p>Your transaction was not completed. Redirecting back...</p>
</main>
</body>
</html>
"#,
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}
