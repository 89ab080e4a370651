use actix_web::{web, HttpRequest, HttpResponse};
use turnstile_core::models::{LoginPayload, LoginResponse, RegisterPayload, RegisterResponse, LOGIN_PATH};

use crate::{
    app_state::AppState,
    cookies::{REFRESH_TOKEN_COOKIE, SESSION_ID_COOKIE},
    error::AuthError,
    flow::{self, IssuedSession},
    handlers::{add_cookies, redirect_to},
    session_store::ClientInfo,
};

fn signed_in(app_state: &AppState, issued: &IssuedSession) -> HttpResponse {
    let mut response = HttpResponse::Ok();
    add_cookies(
        &mut response,
        app_state
            .cookies
            .session_cookies(&issued.tokens, &issued.session_id),
    );
    response.json(LoginResponse {
        success: true,
        onboarded: issued.user.onboarded,
        next_url: issued.next_url().to_string(),
    })
}

/// POST /register
/// Create a password account. The caller logs in separately.
pub async fn register(
    app_state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, AuthError> {
    let user = flow::register(&app_state, &payload).await?;

    Ok(HttpResponse::Ok().json(RegisterResponse {
        success: true,
        user_id: user.id,
        onboarded: user.onboarded,
    }))
}

/// POST /login
/// Verify email and password and set session cookies
pub async fn login(
    app_state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, AuthError> {
    let issued = flow::login(&app_state, &payload, &ClientInfo::from_request(&req)).await?;
    Ok(signed_in(&app_state, &issued))
}

/// POST /refresh
/// Rotate the session behind the refresh token cookie and issue a new pair
pub async fn refresh(app_state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse, AuthError> {
    let refresh_token = req.cookie(REFRESH_TOKEN_COOKIE);
    let session_id = req.cookie(SESSION_ID_COOKIE);

    let issued = flow::refresh(
        &app_state,
        refresh_token.as_ref().map(|c| c.value()),
        session_id.as_ref().map(|c| c.value()),
        &ClientInfo::from_request(&req),
    )
    .await?;

    Ok(signed_in(&app_state, &issued))
}

/// GET /logout
/// Revoke the current session and clear every auth cookie
pub async fn logout(app_state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    let session_id = req.cookie(SESSION_ID_COOKIE);
    flow::logout(&app_state, session_id.as_ref().map(|c| c.value())).await;

    let mut response = redirect_to(LOGIN_PATH);
    add_cookies(&mut response, app_state.cookies.cleared_session_cookies());
    add_cookies(&mut response, app_state.cookies.cleared_oauth_cookies());
    response.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::ACCESS_TOKEN_COOKIE;
    use crate::test_support;
    use actix_web::cookie::Cookie;
    use actix_web::http::{header, StatusCode};
    use actix_web::{test, App};
    use serde_json::{json, Value};

    macro_rules! auth_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .route("/register", web::post().to(register))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::get().to(logout)),
            )
            .await
        };
    }

    fn cookie<'a>(resp: &'a actix_web::dev::ServiceResponse, name: &str) -> Option<Cookie<'a>> {
        resp.response().cookies().find(|c| c.name() == name)
    }

    #[actix_web::test]
    async fn register_then_duplicate() {
        let state = test_support::test_state(None).await;
        let app = auth_app!(state);

        let body = json!({"email": "a@b.co", "password": "secret1"});
        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/register").set_json(&body).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["onboarded"], false);

        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/register").set_json(&body).to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["error"], "duplicate_user");
    }

    #[actix_web::test]
    async fn login_refresh_replay_logout() {
        let state = test_support::test_state(None).await;
        let app = auth_app!(state);

        test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/register")
                .set_json(json!({"email": "a@b.co", "password": "secret1"}))
                .to_request(),
        )
        .await;

        let wrong = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/login")
                .set_json(json!({"email": "a@b.co", "password": "nope"}))
                .to_request(),
        )
        .await;
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        let json: Value = test::read_body_json(wrong).await;
        assert_eq!(json["error"], "invalid_credentials");

        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/login")
                .set_json(json!({"email": "a@b.co", "password": "secret1"}))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let refresh_cookie = cookie(&resp, REFRESH_TOKEN_COOKIE).unwrap().into_owned();
        let session_cookie = cookie(&resp, SESSION_ID_COOKIE).unwrap().into_owned();
        assert_eq!(refresh_cookie.http_only(), Some(true));
        let json: Value = test::read_body_json(resp).await;
        assert_eq!(json["onboarded"], false);
        assert_eq!(json["next_url"], "/onboarding");

        let rotated = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/refresh")
                .cookie(refresh_cookie.clone())
                .cookie(session_cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(rotated.status(), StatusCode::OK);
        let new_session = cookie(&rotated, SESSION_ID_COOKIE).unwrap().into_owned();
        assert_ne!(new_session.value(), session_cookie.value());

        let replay = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/refresh")
                .cookie(refresh_cookie)
                .cookie(session_cookie)
                .to_request(),
        )
        .await;
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
        let json: Value = test::read_body_json(replay).await;
        assert_eq!(json["error"], "session_revoked");

        let out = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/logout")
                .cookie(new_session.clone())
                .to_request(),
        )
        .await;
        assert_eq!(out.status(), StatusCode::FOUND);
        assert_eq!(out.headers().get(header::LOCATION).unwrap(), "/login");
        assert_eq!(cookie(&out, ACCESS_TOKEN_COOKIE).unwrap().value(), "");
        assert!(!state.sessions.is_live(new_session.value()).await.unwrap());
    }

    #[actix_web::test]
    async fn logout_without_cookies_still_redirects() {
        let state = test_support::test_state(None).await;
        let app = auth_app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/logout").to_request()).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert!(cookie(&resp, SESSION_ID_COOKIE).is_some());
    }

    #[actix_web::test]
    async fn refresh_without_cookies_is_401() {
        let state = test_support::test_state(None).await;
        let app = auth_app!(state);

        let resp = test::call_service(&app, test::TestRequest::post().uri("/refresh").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
