pub mod cookies;
pub mod password;
pub mod validation;

pub use cookies::{clear_auth_cookies, set_auth_cookies, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
pub use password::{Argon2Scheme, Password, PasswordHashString, PasswordScheme};
pub use validation::ValidatedJson;
