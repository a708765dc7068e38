//! Search page.

use axum::response::Html;

const INDEX: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Order lookup</title>
</head>
<body>
    <h1>Order lookup</h1>
    <form action="/search" method="get">
        <label for="order_uid">order_uid</label>
        <input id="order_uid" name="order_uid" type="text" required>
        <button type="submit">Search</button>
    </form>
</body>
</html>
"#;

/// `GET /`
#[allow(clippy::unused_async)]
pub async fn index() -> Html<&'static str> {
    Html(INDEX)
}
