/// Router Module Index
///
/// Routing is segregated by access tier so the middleware boundary is
/// visible in the module layout rather than buried per-route.

/// Routes open to anonymous callers (health, login).
pub mod public;

/// Routes behind the authentication layer, open to any role.
pub mod authenticated;

/// Routes behind the authentication layer whose handlers additionally
/// require the admin role through the authorizer.
pub mod admin;
