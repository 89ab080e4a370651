// Handler modules
pub mod auth;
pub mod user;

use actix_web::cookie::Cookie;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, HttpResponseBuilder, Responder};
use turnstile_core::models::{ConfigResponse, OAuthCallbackQuery};
use turnstile_core::oauth::AuthProvider;

use crate::{
    app_state::AppState,
    cookies::{OAUTH_STATE_COOKIE, OAUTH_VERIFIER_COOKIE},
    flow,
    session_store::ClientInfo,
};

pub(crate) fn add_cookies<I>(response: &mut HttpResponseBuilder, cookies: I)
where
    I: IntoIterator<Item = Cookie<'static>>,
{
    for cookie in cookies {
        response.cookie(cookie);
    }
}

pub(crate) fn redirect_to(location: &str) -> HttpResponseBuilder {
    let mut response = HttpResponse::Found();
    response.insert_header((header::LOCATION, location.to_string()));
    response
}

/// GET /config
/// Returns which login methods are available
pub async fn get_config(app_state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(ConfigResponse {
        password_login: true,
        github_oauth: app_state.oauth.is_configured(AuthProvider::Github),
        google_oauth: app_state.oauth.is_configured(AuthProvider::Google),
    })
}

/// GET /login/{provider}
/// Starts the PKCE authorization-code flow and redirects to the provider
pub async fn login_start(app_state: web::Data<AppState>, provider: web::Path<String>) -> HttpResponse {
    match flow::begin_login(&app_state, &provider) {
        Ok(request) => {
            let mut response = redirect_to(&request.url);
            add_cookies(
                &mut response,
                app_state.cookies.oauth_cookies(&request.state, &request.code_verifier),
            );
            response.finish()
        }
        Err(e) => {
            log::warn!("Cannot start {provider} login: {e}");
            redirect_to(&e.login_redirect()).finish()
        }
    }
}

/// GET /callback/{provider}
/// Handles the provider redirect, signs the user in and routes by onboarding status
pub async fn oauth_callback(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    provider: web::Path<String>,
    query: web::Query<OAuthCallbackQuery>,
) -> HttpResponse {
    let stored_state = req.cookie(OAUTH_STATE_COOKIE);
    let code_verifier = req.cookie(OAUTH_VERIFIER_COOKIE);

    let outcome = flow::complete_callback(
        &app_state,
        &provider,
        &query,
        stored_state.as_ref().map(|c| c.value()),
        code_verifier.as_ref().map(|c| c.value()),
        &ClientInfo::from_request(&req),
    )
    .await;

    // State and verifier are single-use regardless of the outcome.
    let mut response = match &outcome {
        Ok(issued) => {
            let mut response = redirect_to(issued.next_url());
            add_cookies(
                &mut response,
                app_state
                    .cookies
                    .session_cookies(&issued.tokens, &issued.session_id),
            );
            response
        }
        Err(e) => {
            if e.is_client_error() {
                log::warn!("{provider} callback rejected: {e}");
            } else {
                log::error!("{provider} callback failed: {e}");
            }
            redirect_to(&e.login_redirect())
        }
    };
    add_cookies(&mut response, app_state.cookies.cleared_oauth_cookies());
    response.finish()
}
