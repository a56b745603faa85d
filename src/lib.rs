//! # Ingreso
//!
//! `ingreso` is the glue between an application and a third-party managed
//! identity-and-document-database platform. It ships two independent pieces:
//!
//! - An HTTP service exposing a single callable operation, `POST /requests`,
//!   that validates an inbound access-request form (requester, email, Chilean
//!   RUT, institution, request type) and records it in the platform's
//!   document store after checking for conflicting accounts or pending
//!   requests. The RUT is verified with the Modulus-11 check-digit algorithm.
//! - Session-tracking capabilities for UI layers: a passive
//!   [`platform::session::SessionObserver`] that republishes the current
//!   user, decoded token claims and the derived active-plugin list, and a
//!   [`platform::session::CredentialSession`] exposing explicit
//!   login/logout operations.
//!
//! Authentication, persistence and querying are delegated to the platform,
//! reached over its REST surface; nothing here reimplements those systems.

pub mod cli;
pub mod ingreso;
pub mod platform;
pub mod rut;
