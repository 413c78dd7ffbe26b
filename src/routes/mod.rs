/// Router Module Index
///
/// Routes are split by access tier so each tier's middleware is applied once, at the
/// module boundary, in `create_router`.

/// Routes open to anonymous visitors. Handlers that care about identity take a `Session`.
pub mod public;

/// Routes behind the `AuthUser` extractor middleware.
pub mod authenticated;

/// Routes behind the gate pipeline middleware (`/admin` rule).
pub mod admin;
