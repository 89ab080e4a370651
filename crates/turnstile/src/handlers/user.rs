use actix_web::{web, HttpResponse};
use entity::user;
use turnstile_core::models::{
    DashboardResponse, OnboardingPayload, OnboardingResponse, UserInfo, DASHBOARD_PATH,
};

use crate::{
    app_state::AppState,
    error::AuthError,
    flow,
    guard::{AuthenticatedUser, OnboardedUser},
    handlers::redirect_to,
};

fn user_info(user: &user::Model) -> UserInfo {
    UserInfo {
        id: user.id.clone(),
        email: user.email.clone(),
        provider: user.provider.clone(),
        onboarded: user.onboarded,
    }
}

/// GET /me
/// Get current user information
pub async fn me(AuthenticatedUser(user): AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(user_info(&user))
}

/// GET /onboarding
/// Users who already finished onboarding are sent on to the dashboard
pub async fn onboarding_status(AuthenticatedUser(user): AuthenticatedUser) -> HttpResponse {
    if user.onboarded {
        return redirect_to(DASHBOARD_PATH).finish();
    }
    HttpResponse::Ok().json(user_info(&user))
}

/// POST /onboarding
/// Save the onboarding answers (and the store, for sellers)
pub async fn submit_onboarding(
    app_state: web::Data<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    payload: web::Json<OnboardingPayload>,
) -> Result<HttpResponse, AuthError> {
    flow::complete_onboarding(&app_state, &user, &payload).await?;

    Ok(HttpResponse::Ok().json(OnboardingResponse {
        success: true,
        next_url: DASHBOARD_PATH.to_string(),
    }))
}

/// GET /dashboard
pub async fn dashboard(
    app_state: web::Data<AppState>,
    OnboardedUser(user): OnboardedUser,
) -> Result<HttpResponse, AuthError> {
    let profile = app_state.profiles.find_profile(&user.id).await?;
    let (full_name, role) = profile
        .map(|p| (p.full_name, p.role))
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(DashboardResponse {
        user: user_info(&user),
        full_name,
        role,
    }))
}
