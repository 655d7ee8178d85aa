pub mod auth;
pub mod error;
pub mod folders;
pub mod me;
pub mod middleware;
pub mod mnemonics;
pub mod routes;
pub mod tokens;

pub use auth::{AppState, AppStateInner, GithubOAuth};
pub use error::{ApiError, ApiResult};
pub use routes::router;
