use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, ProfileInput, ProfileResponse, RefreshRequest, RegisterRequest, RegisterResponse},
        jwt::{JwtKeys, TokenKind, TokenPair},
        password,
        validation::{validate_profile, validate_registration},
    },
    error::{ApiError, ApiResult, FieldErrors},
    state::AppState,
    users::NewUser,
};

/// Validates, signs the token pair, then inserts. Nothing is written unless
/// every earlier step succeeded, and the insert itself is one statement.
pub async fn register(state: &AppState, payload: RegisterRequest) -> ApiResult<RegisterResponse> {
    let today = state.today();
    let valid = validate_registration(payload, today).map_err(ApiError::Validation)?;

    let mut errors = FieldErrors::default();
    if state.users.find_by_username(&valid.username).await?.is_some() {
        errors.add("username", "A user with that username already exists.");
    }
    if state.users.find_by_email(&valid.email).await?.is_some() {
        errors.add("email", "A user with that email already exists.");
    }
    if !errors.is_empty() {
        warn!(username = %valid.username, "registration rejected: duplicate identity");
        return Err(ApiError::Validation(errors));
    }

    let password = valid.password;
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .context("join password hasher")??;

    let id = Uuid::new_v4();
    let tokens = JwtKeys::from(&state.config.jwt).sign_pair(id)?;

    let user = state
        .users
        .create(NewUser {
            id,
            username: valid.username,
            email: valid.email,
            password_hash,
            profile: valid.profile,
        })
        .await?;

    info!(user_id = %user.id, user = %user, "user registered");
    Ok(RegisterResponse {
        user: ProfileResponse::from_user(user, today, &state.config.youth),
        tokens,
    })
}

/// Blank fields, unknown username and wrong password all produce the same
/// error.
pub async fn login(state: &AppState, payload: LoginRequest) -> ApiResult<TokenPair> {
    let username = payload.username.trim().to_string();
    let user = if username.is_empty() || payload.password.is_empty() {
        None
    } else {
        state.users.find_by_username(&username).await?
    };
    let password = payload.password;

    let Some(user) = user else {
        tokio::task::spawn_blocking(move || password::verify_dummy(&password))
            .await
            .context("join password verifier")?;
        warn!("login failed");
        return Err(ApiError::invalid_credentials());
    };

    let hash = user.password_hash.clone();
    let ok = tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .context("join password verifier")??;
    if !ok {
        warn!(user_id = %user.id, "login failed");
        return Err(ApiError::invalid_credentials());
    }

    let tokens = JwtKeys::from(&state.config.jwt).sign_pair(user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(tokens)
}

pub async fn refresh(state: &AppState, payload: RefreshRequest) -> ApiResult<TokenPair> {
    let keys = JwtKeys::from(&state.config.jwt);
    let claims = keys
        .verify_kind(payload.refresh.trim(), TokenKind::Refresh)
        .map_err(|e| {
            warn!(error = %e, "refresh rejected");
            ApiError::Authentication("Token is invalid or expired".into())
        })?;

    if state.users.find_by_id(claims.sub).await?.is_none() {
        warn!(user_id = %claims.sub, "refresh for missing user");
        return Err(ApiError::Authentication("Token is invalid or expired".into()));
    }

    Ok(keys.sign_pair(claims.sub)?)
}

pub async fn get_profile(state: &AppState, user_id: Uuid) -> ApiResult<ProfileResponse> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(ProfileResponse::from_user(user, state.today(), &state.config.youth))
}

pub async fn update_profile(state: &AppState, user_id: Uuid, input: ProfileInput) -> ApiResult<ProfileResponse> {
    let today = state.today();
    let mut errors = FieldErrors::default();
    let changes = validate_profile(input, today, &mut errors);
    errors.into_result()?;

    let user = state
        .users
        .update_profile(user_id, changes)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    info!(
        user_id = %user.id,
        completion = user.profile_completion_percentage(),
        "profile updated"
    );
    Ok(ProfileResponse::from_user(user, today, &state.config.youth))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::UserRepository;

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password: "greenjobs2024".into(),
            password_confirm: "greenjobs2024".into(),
            profile: ProfileInput {
                first_name: Some("Faith".into()),
                last_name: Some("Njeri".into()),
                county: Some("Nakuru".into()),
                ..ProfileInput::default()
            },
        }
    }

    #[tokio::test]
    async fn register_creates_user_and_tokens() {
        let (state, repo) = AppState::fake_with_repo();
        let resp = register(&state, register_request("faith", "Faith@Example.com")).await.unwrap();

        assert_eq!(resp.user.username, "faith");
        assert_eq!(resp.user.email, "faith@example.com");
        assert_eq!(resp.user.display_name, "Faith Njeri (faith)");
        assert_eq!(repo.len(), 1);

        let keys = JwtKeys::from(&state.config.jwt);
        let claims = keys.verify_kind(&resp.tokens.access, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, resp.user.id);

        let stored = repo.find_by_username("faith").await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "greenjobs2024");
        assert!(password::verify_password("greenjobs2024", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn password_mismatch_creates_nothing() {
        let (state, repo) = AppState::fake_with_repo();
        let mut req = register_request("faith", "faith@example.com");
        req.password_confirm = "different-password".into();

        let err = register(&state, req).await.unwrap_err();
        match err {
            ApiError::Validation(errors) => assert!(errors.contains("password_confirm")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(repo.len(), 0);
    }

    #[tokio::test]
    async fn duplicate_username_leaves_existing_user_untouched() {
        let (state, repo) = AppState::fake_with_repo();
        register(&state, register_request("faith", "faith@example.com")).await.unwrap();
        let before = repo.find_by_username("faith").await.unwrap().unwrap();

        let mut again = register_request("faith", "other@example.com");
        again.profile.county = Some("Mombasa".into());
        let err = register(&state, again).await.unwrap_err();
        match err {
            ApiError::Validation(errors) => {
                assert!(errors.contains("username"));
                assert!(!errors.contains("email"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let after = repo.find_by_username("faith").await.unwrap().unwrap();
        assert_eq!(repo.len(), 1);
        assert_eq!(after.email, before.email);
        assert_eq!(after.profile, before.profile);
        assert_eq!(after.password_hash, before.password_hash);
    }

    #[tokio::test]
    async fn duplicate_email_is_case_insensitive() {
        let (state, repo) = AppState::fake_with_repo();
        register(&state, register_request("faith", "faith@example.com")).await.unwrap();
        let err = register(&state, register_request("njeri", "FAITH@example.com")).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains("email")));
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn login_returns_pair_for_valid_credentials() {
        let state = AppState::fake();
        let registered = register(&state, register_request("faith", "faith@example.com")).await.unwrap();

        let pair = login(
            &state,
            LoginRequest {
                username: "faith".into(),
                password: "greenjobs2024".into(),
            },
        )
        .await
        .unwrap();
        let keys = JwtKeys::from(&state.config.jwt);
        assert_eq!(keys.verify_kind(&pair.refresh, TokenKind::Refresh).unwrap().sub, registered.user.id);
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let state = AppState::fake();
        register(&state, register_request("faith", "faith@example.com")).await.unwrap();

        let wrong_password = login(
            &state,
            LoginRequest {
                username: "faith".into(),
                password: "not-the-password".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown_user = login(
            &state,
            LoginRequest {
                username: "nobody".into(),
                password: "greenjobs2024".into(),
            },
        )
        .await
        .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert!(matches!(wrong_password, ApiError::Authentication(_)));
        assert!(matches!(unknown_user, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn blank_login_fields_are_invalid_credentials() {
        let state = AppState::fake();
        register(&state, register_request("faith", "faith@example.com")).await.unwrap();

        for (username, password) in [("", "greenjobs2024"), ("faith", ""), ("   ", "")] {
            let err = login(
                &state,
                LoginRequest {
                    username: username.into(),
                    password: password.into(),
                },
            )
            .await
            .unwrap_err();
            assert!(matches!(err, ApiError::Authentication(_)), "{username:?}/{password:?}");
            assert_eq!(err.to_string(), ApiError::invalid_credentials().to_string());
        }
    }

    #[tokio::test]
    async fn refresh_requires_refresh_token() {
        let state = AppState::fake();
        let registered = register(&state, register_request("faith", "faith@example.com")).await.unwrap();

        let pair = refresh(
            &state,
            RefreshRequest {
                refresh: registered.tokens.refresh.clone(),
            },
        )
        .await
        .unwrap();
        assert!(!pair.access.is_empty());

        let err = refresh(
            &state,
            RefreshRequest {
                refresh: registered.tokens.access,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn refresh_for_unknown_user_is_rejected() {
        let state = AppState::fake();
        let orphan = JwtKeys::from(&state.config.jwt).sign_pair(Uuid::new_v4()).unwrap();
        let err = refresh(&state, RefreshRequest { refresh: orphan.refresh }).await.unwrap_err();
        assert!(matches!(err, ApiError::Authentication(_)));
    }

    #[tokio::test]
    async fn update_profile_merges_and_recomputes() {
        let state = AppState::fake();
        let registered = register(&state, register_request("faith", "faith@example.com")).await.unwrap();
        assert_eq!(registered.user.profile_completion_percentage, 33);

        let updated = update_profile(
            &state,
            registered.user.id,
            ProfileInput {
                phone_number: Some("0712345678".into()),
                gender: Some("female".into()),
                ..ProfileInput::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.county.as_deref(), Some("Nakuru"));
        assert_eq!(updated.phone_number.as_deref(), Some("0712345678"));
        assert_eq!(updated.profile_completion_percentage, 55);
    }

    #[tokio::test]
    async fn update_profile_rejects_bad_choice_without_writing() {
        let state = AppState::fake();
        let registered = register(&state, register_request("faith", "faith@example.com")).await.unwrap();

        let err = update_profile(
            &state,
            registered.user.id,
            ProfileInput {
                county: Some("Kisumu".into()),
                employment_status: Some("retired".into()),
                ..ProfileInput::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref e) if e.contains("employment_status")));

        let profile = get_profile(&state, registered.user.id).await.unwrap();
        assert_eq!(profile.county.as_deref(), Some("Nakuru"));
    }

    #[tokio::test]
    async fn missing_user_profile_is_not_found() {
        let state = AppState::fake();
        let err = get_profile(&state, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }
}
