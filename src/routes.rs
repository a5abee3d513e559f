use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::analytics::{self, ChartData, TrendPoint};
use crate::auth::CredentialGate;
use crate::error::{AppError, Result};
use crate::model::{Band, LinearModel, Tone};
use crate::session::{Session, SessionEvent, SessionStore, SESSION_COOKIE};
use crate::views::{self, Flash};

/// Everything the handlers share: the frozen model, the credential gate and
/// the session table.
pub struct AppState {
    pub model: LinearModel,
    pub gate: CredentialGate,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(model: LinearModel, gate: CredentialGate) -> Self {
        Self::with_sessions(model, gate, SessionStore::new())
    }

    pub fn with_sessions(model: LinearModel, gate: CredentialGate, sessions: SessionStore) -> Self {
        Self {
            model,
            gate,
            sessions,
        }
    }
}

#[derive(Deserialize)]
pub struct CredentialsForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PredictForm {
    pub hours: String,
}

#[derive(Deserialize)]
pub struct PredictRequest {
    pub hours: f64,
}

#[derive(Serialize)]
pub struct PredictResponse {
    pub hours: f64,
    pub cgpa: f64,
    pub band: Band,
    pub message: &'static str,
    pub tone: Tone,
    pub progress: u8,
    pub celebrate: bool,
}

#[derive(Serialize)]
pub struct TrendResponse {
    pub points: Vec<TrendPoint>,
    pub chart: ChartData,
}

/// The caller's session token (if any) and the session it maps to.
struct Current {
    token: Option<String>,
    session: Session,
}

fn current(req: &HttpRequest, state: &AppState) -> Result<Current> {
    let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
    let session = state.sessions.get(token.as_deref())?;
    Ok(Current { token, session })
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

fn removal_cookie() -> Cookie<'static> {
    let mut cookie = session_cookie(String::new());
    cookie.make_removal();
    cookie
}

fn redirect_home(cookie: Option<Cookie<'static>>) -> HttpResponse {
    let mut resp = HttpResponse::SeeOther();
    resp.insert_header((header::LOCATION, "/"));
    if let Some(cookie) = cookie {
        resp.cookie(cookie);
    }
    resp.finish()
}

/// Stores the next session state and sends the browser back to `/`.
/// Sessions that fall back to the logged-out default lose their cookie.
fn commit_and_redirect(state: &AppState, current: Current, next: Session) -> Result<HttpResponse> {
    let cookie = match state.sessions.commit(current.token.as_deref(), next)? {
        Some(token) => session_cookie(token),
        None => removal_cookie(),
    };
    Ok(redirect_home(Some(cookie)))
}

fn html(status: StatusCode, body: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(body)
}

fn require_login(current: &Current) -> Result<()> {
    if current.session.logged_in {
        Ok(())
    } else {
        Err(AppError::NotLoggedIn)
    }
}

async fn index(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    let body = if current.session.logged_in {
        views::predictor_page(&current.session, 0.0, None, &analytics::trend(&state.model), None)
    } else {
        views::login_page(&current.session, None)
    };
    Ok(html(StatusCode::OK, body))
}

async fn login(
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    let form = form.into_inner();

    if state.gate.authenticate(&form.username, &form.password)? {
        info!("User {} logged in", form.username);
        let next = current.session.apply(SessionEvent::LoginSucceeded {
            username: form.username,
        });
        let token = state.sessions.rotate(current.token.as_deref(), next)?;
        return Ok(redirect_home(Some(session_cookie(token))));
    }

    warn!("Denied login for {:?}", form.username);
    let session = current.session.apply(SessionEvent::LoginFailed);
    let body = views::login_page(&session, Some(&Flash::error("Invalid credentials ❌")));
    Ok(html(StatusCode::UNAUTHORIZED, body))
}

async fn register(
    req: HttpRequest,
    form: web::Form<CredentialsForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    if current.session.logged_in {
        return Ok(redirect_home(None));
    }

    let (status, flash) = match state.gate.register(&form.username, &form.password) {
        Ok(()) => (
            StatusCode::OK,
            Flash::success("Account created ✅ You can log in now."),
        ),
        Err(AppError::AlreadyExists(_)) => {
            (StatusCode::CONFLICT, Flash::error("User already exists ❌"))
        }
        Err(err @ (AppError::ReadOnlyStore | AppError::InvalidInput(_))) => {
            (err.status_code(), Flash::error(err.to_string()))
        }
        Err(err) => return Err(err),
    };

    Ok(html(status, views::login_page(&current.session, Some(&flash))))
}

async fn logout(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    if current.session.logged_in {
        info!("User {} logged out", current.session.username);
    }
    let next = current.session.clone().apply(SessionEvent::Logout);
    commit_and_redirect(&state, current, next)
}

async fn toggle_theme(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    let next = current.session.clone().apply(SessionEvent::ToggleTheme);
    commit_and_redirect(&state, current, next)
}

async fn predict(
    req: HttpRequest,
    form: web::Form<PredictForm>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    let current = current(&req, &state)?;
    if !current.session.logged_in {
        return Ok(redirect_home(None));
    }

    let trend = analytics::trend(&state.model);
    let hours = match form.hours.trim().parse::<f64>() {
        Ok(h) if h.is_finite() => h,
        _ => {
            let flash = Flash::error("Study hours must be a number between 0 and 24");
            let body = views::predictor_page(&current.session, 0.0, None, &trend, Some(&flash));
            return Ok(html(StatusCode::BAD_REQUEST, body));
        }
    };

    let prediction = state.model.predict_cgpa(hours);
    info!(
        "Prediction for {}: {:.1}h -> {:.2} ({:?})",
        current.session.username, prediction.hours, prediction.cgpa, prediction.band
    );
    let body = views::predictor_page(
        &current.session,
        prediction.hours,
        Some(&prediction),
        &trend,
        None,
    );
    Ok(html(StatusCode::OK, body))
}

async fn api_predict(
    req: HttpRequest,
    body: web::Json<PredictRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse> {
    require_login(&current(&req, &state)?)?;
    if !body.hours.is_finite() {
        return Err(AppError::InvalidInput("hours must be finite".to_string()));
    }

    let prediction = state.model.predict_cgpa(body.hours);
    Ok(HttpResponse::Ok().json(PredictResponse {
        hours: prediction.hours,
        cgpa: prediction.cgpa,
        band: prediction.band,
        message: prediction.band.message(),
        tone: prediction.band.tone(),
        progress: prediction.progress(),
        celebrate: prediction.band.celebrate(),
    }))
}

async fn api_trend(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    require_login(&current(&req, &state)?)?;
    let points = analytics::trend(&state.model);
    let chart = analytics::chart_data(&points);
    Ok(HttpResponse::Ok().json(TrendResponse { points, chart }))
}

async fn trend_csv(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    require_login(&current(&req, &state)?)?;
    let csv = analytics::trend_csv(&analytics::trend(&state.model))?;
    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"cgpa_trend.csv\"",
        ))
        .body(csv))
}

async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("CGPA Predictor is running!")
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index))
        .route("/login", web::post().to(login))
        .route("/register", web::post().to(register))
        .route("/logout", web::post().to(logout))
        .route("/theme", web::post().to(toggle_theme))
        .route("/predict", web::post().to(predict))
        .route("/api/predict", web::post().to(api_predict))
        .route("/api/trend", web::get().to(api_trend))
        .route("/trend.csv", web::get().to(trend_csv))
        .route("/health", web::get().to(health_check));
}
