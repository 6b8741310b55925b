/// Router Module Index
///
/// Routes are split by how much the caller must prove. Authentication is applied as a
/// layer on a whole router, so a handler cannot be exposed without it by accident.

/// Routes reachable without a token. `DELETE /movies/{id}` is registered here too:
/// it authenticates through its `AuthUser` argument and checks the admin role itself.
pub mod public;

/// Routes behind the `auth_middleware` layer; every handler receives an `AuthUser`.
pub mod authenticated;
