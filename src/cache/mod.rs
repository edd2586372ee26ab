//! Content-addressed runtime cache
//!
//! The bundled runtime is unpacked once per build into a directory named
//! after the build's digest. Only one build's deployment is kept: deploying
//! a new digest prunes the others.
//!
//! # Deployment States
//!
//! | State | On disk | Next run |
//! |-------|---------|----------|
//! | Miss | nothing | restore under lock |
//! | Staging | `<name>.partial` | discarded and restored again |
//! | Deployed | `<name>` | reused as-is |

pub mod deploy;
pub mod digest;
pub mod notice;

pub use deploy::{CacheManager, CacheRoot, Deployer, Deployment};
pub use digest::{Identity, IdentitySource};
pub use notice::{DelayedNotice, NoticeSink};
