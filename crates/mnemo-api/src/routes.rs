use axum::{
    Router,
    routing::{get, post, put},
};

use crate::auth::{self, AppState};
use crate::{folders, me, mnemonics, tokens};

/// Every API route. Authentication is resolved per handler because the
/// same path can take different credentials per method
/// (`GET /api/mnemonics/{name}` is bearer-only, `PUT` on it is hybrid).
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(me::health))
        // Browser sign-in
        .route("/api/auth/signin/github", get(auth::github_signin))
        .route("/api/auth/callback/github", get(auth::github_callback))
        .route("/api/auth/session", get(auth::current_session))
        .route("/api/auth/signout", post(auth::signout))
        // CLI tokens (session only)
        .route("/api/tokens", get(tokens::list_tokens).post(tokens::create_token))
        .route(
            "/api/tokens/{id}",
            put(tokens::update_token).delete(tokens::revoke_token),
        )
        // Bearer only
        .route("/api/me", get(me::whoami))
        // Folders (hybrid)
        .route("/api/folders", get(folders::list_folders).post(folders::create_folder))
        .route(
            "/api/folders/{id}",
            put(folders::update_folder).delete(folders::delete_folder),
        )
        // Mnemonics
        .route(
            "/api/mnemonics",
            get(mnemonics::list_mnemonics).post(mnemonics::create_mnemonic),
        )
        .route(
            "/api/mnemonics/{key}",
            get(mnemonics::get_mnemonic_by_name)
                .put(mnemonics::update_mnemonic)
                .delete(mnemonics::delete_mnemonic),
        )
        .route("/api/mnemonics/{key}/edit", get(mnemonics::get_mnemonic_for_editing))
        .route("/api/mnemonics/name/{name}", get(mnemonics::get_mnemonic_by_name))
        .with_state(state)
}
