// Token acquisition and account creation; no authentication required

pub mod login; // POST /login/
pub mod refresh; // POST /token/refresh/
pub mod register; // POST /register/

pub use login::login_post;
pub use refresh::refresh_post;
pub use register::register_post;
