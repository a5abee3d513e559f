//! Server-rendered HTML for the login and predictor pages.

use crate::analytics::{self, TrendPoint};
use crate::model::{Prediction, Tone, MAX_HOURS, MIN_HOURS};
use crate::session::Session;

const CHART_WIDTH: f64 = 560.0;
const CHART_HEIGHT: f64 = 320.0;

const STYLE: &str = r#"
    body { font-family: Arial, sans-serif; max-width: 720px; margin: 40px auto; padding: 20px; }
    body.dark { background-color: #0e1117; color: white; }
    .container { background: #f5f5f5; padding: 25px; border-radius: 10px; }
    body.dark .container { background: #161b22; }
    .form-group { margin: 15px 0; }
    label { display: block; margin-bottom: 5px; font-weight: bold; }
    input { width: 100%; padding: 10px; border: 1px solid #ddd; border-radius: 4px; box-sizing: border-box; }
    button { background: #007bff; color: white; padding: 12px 24px; border: none; border-radius: 4px; cursor: pointer; margin: 5px 0; }
    button:hover { background: #0056b3; }
    .inline { display: inline; }
    .msg { margin: 15px 0; padding: 15px; border-radius: 5px; }
    .success { background: #d4edda; color: #155724; border: 1px solid #c3e6cb; }
    .info { background: #d1ecf1; color: #0c5460; border: 1px solid #bee5eb; }
    .warning { background: #fff3cd; color: #856404; border: 1px solid #ffeaa7; }
    .error { background: #f8d7da; color: #721c24; border: 1px solid #f5c6cb; }
    .progress { background: #ddd; border-radius: 4px; height: 14px; overflow: hidden; }
    .progress > div { background: #28a745; height: 100%; }
    .metrics { display: grid; grid-template-columns: 1fr 1fr 1fr; gap: 15px; margin: 20px 0; }
    .metric { background: white; color: #333; padding: 15px; border-radius: 8px; border-left: 4px solid #007bff; }
    .metric p { font-size: 24px; margin: 0; color: #007bff; }
    svg.trend { max-width: 100%; }
"#;

/// A one-off message shown above the page content.
#[derive(Debug, Clone)]
pub struct Flash {
    pub class: &'static str,
    pub text: String,
}

impl Flash {
    pub fn success(text: impl Into<String>) -> Self {
        Self { class: "success", text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { class: "error", text: text.into() }
    }
}

fn tone_class(tone: Tone) -> &'static str {
    match tone {
        Tone::Info => "info",
        Tone::Warning => "warning",
        Tone::Error => "error",
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, dark: bool, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{title}</title>
    <style>{STYLE}</style>
</head>
<body class="{class}">
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        title = escape_html(title),
        class = if dark { "dark" } else { "" },
    )
}

fn flash_html(flash: Option<&Flash>) -> String {
    flash
        .map(|f| format!(r#"<div class="msg {}">{}</div>"#, f.class, escape_html(&f.text)))
        .unwrap_or_default()
}

pub fn login_page(session: &Session, flash: Option<&Flash>) -> String {
    let body = format!(
        r##"        <h1>🔐 Student Login</h1>
        {flash}
        <form method="post" action="/login">
            <div class="form-group">
                <label for="username">Username</label>
                <input type="text" id="username" name="username">
            </div>
            <div class="form-group">
                <label for="password">Password</label>
                <input type="password" id="password" name="password">
            </div>
            <button type="submit">Login</button>
            <button type="submit" formaction="/register" style="background: #6c757d;">Register</button>
        </form>"##,
        flash = flash_html(flash),
    );
    page("CGPA Predictor - Login", session.dark_mode, &body)
}

fn prediction_html(prediction: &Prediction) -> String {
    let band = prediction.band;
    let celebrate = if band.celebrate() { " 🎈🎈🎈" } else { "" };
    format!(
        r#"<div class="msg success">{headline}</div>
        <div class="msg {tone}">{message}{celebrate}</div>
        <div class="progress"><div style="width: {progress}%"></div></div>"#,
        headline = prediction.headline(),
        tone = tone_class(band.tone()),
        message = band.message(),
        progress = prediction.progress(),
    )
}

pub fn predictor_page(
    session: &Session,
    hours: f64,
    prediction: Option<&Prediction>,
    trend: &[TrendPoint],
    flash: Option<&Flash>,
) -> String {
    let metrics: String = analytics::dashboard()
        .iter()
        .map(|m| {
            format!(
                r#"<div class="metric"><h4>{}</h4><p>{}</p></div>"#,
                m.label, m.value
            )
        })
        .collect();

    let body = format!(
        r##"        <form method="post" action="/theme" class="inline">
            <button type="submit" style="background: #343a40;">🌙 Dark Mode: {theme}</button>
        </form>
        <h1>🎓 CGPA Predictor</h1>
        <p>Welcome <strong>{username}</strong> 👋</p>
        {flash}
        <form method="post" action="/predict">
            <div class="form-group">
                <label for="hours">📚 Study Hours</label>
                <input type="number" id="hours" name="hours" min="{min}" max="{max}" step="0.5" value="{hours}">
            </div>
            <button type="submit">Predict CGPA 🚀</button>
        </form>
        {result}
        <h2>📈 CGPA Trend</h2>
        {chart}
        <p><a href="/trend.csv">Download trend data (CSV)</a></p>
        <h2>📊 Dashboard</h2>
        <div class="metrics">{metrics}</div>
        <form method="post" action="/logout">
            <button type="submit" style="background: #dc3545;">Logout</button>
        </form>"##,
        theme = if session.dark_mode { "On" } else { "Off" },
        username = escape_html(&session.username),
        flash = flash_html(flash),
        min = MIN_HOURS,
        max = MAX_HOURS,
        hours = hours,
        result = prediction.map(prediction_html).unwrap_or_default(),
        chart = analytics::trend_svg(trend, CHART_WIDTH, CHART_HEIGHT),
        metrics = metrics,
    );
    page("CGPA Predictor", session.dark_mode, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinearModel;
    use crate::session::SessionEvent;

    fn logged_in(name: &str) -> Session {
        Session::default().apply(SessionEvent::LoginSucceeded { username: name.to_string() })
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html(r#"<b>"x" & 'y'</b>"#), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn login_page_shows_flash() {
        let html = login_page(&Session::default(), Some(&Flash::error("Invalid credentials ❌")));
        assert!(html.contains("Student Login"));
        assert!(html.contains(r#"class="msg error""#));
        assert!(html.contains("Invalid credentials"));
    }

    #[test]
    fn predictor_page_renders_result_and_dashboard() {
        let model = LinearModel::new(0.3, 2.0).unwrap();
        let prediction = model.predict_cgpa(10.0);
        let html = predictor_page(
            &logged_in("<alice>"),
            10.0,
            Some(&prediction),
            &analytics::trend(&model),
            None,
        );
        assert!(html.contains("&lt;alice&gt;"));
        assert!(html.contains("Predicted CGPA: 5.00"));
        assert!(html.contains("Can improve"));
        assert!(html.contains(r#"class="msg warning""#));
        assert!(html.contains("Recommended Hours"));
        assert!(html.contains("<polyline"));
    }

    #[test]
    fn dark_mode_sets_body_class() {
        let session = logged_in("bob").apply(SessionEvent::ToggleTheme);
        let html = predictor_page(&session, 0.0, None, &[], None);
        assert!(html.contains(r#"<body class="dark">"#));
        assert!(html.contains("Dark Mode: On"));
    }
}
