//! Minimal HTML shells for the admin console entry points. The console itself is
//! a client application; these pages exist so the edge gate has real targets to
//! redirect between.

use axum::response::Html;

const LOGIN_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Sign in</title></head>
<body>
<form id="login">
  <input name="email" type="email" placeholder="Email" required>
  <input name="password" type="password" placeholder="Password" required>
  <button type="submit">Sign in</button>
  <p id="error" role="alert"></p>
</form>
<script>
document.getElementById("login").addEventListener("submit", async (event) => {
  event.preventDefault();
  const form = new FormData(event.target);
  const response = await fetch("/auth/login", {
    method: "POST",
    headers: { "content-type": "application/json" },
    body: JSON.stringify({ email: form.get("email"), password: form.get("password") }),
  });
  if (response.ok) {
    window.location.assign("/admin");
  } else {
    const body = await response.json().catch(() => ({}));
    document.getElementById("error").textContent = body.error || "Sign in failed";
  }
});
</script>
</body>
</html>
"#;

const DASHBOARD_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Admin</title></head>
<body>
<main id="dashboard" data-profile-endpoint="/admin/api/me" data-stats-endpoint="/admin/api/stats"></main>
<form method="post" action="/auth/logout"><button type="submit">Sign out</button></form>
</body>
</html>
"#;

/// GET /admin/login
pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

/// GET /admin
pub async fn dashboard_page() -> Html<&'static str> {
    Html(DASHBOARD_PAGE)
}
