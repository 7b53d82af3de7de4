//! Declarative entity definitions for the toolbox's declared schema binding
//! Covers the bundled users/addresses/roles example schema

pub mod address;
pub mod role;
pub mod user;

use sqltoolbox::DeclaredTables;

/// Declared table set covering the bundled entities, registered in
/// dependency order so table creation can run front to back.
pub fn declared_tables() -> DeclaredTables {
    DeclaredTables::new()
        .entity(role::Entity)
        .entity(user::Entity)
        .entity(address::Entity)
}
