pub(crate) mod authorized_caller;
pub(crate) mod session_cookies;
