//! KDL configuration parsing for the Clarissa release pipeline.
//!
//! A release file names the stack being delivered, the repositories that feed
//! it and the credential used to fetch them:
//!
//! ```kdl
//! release "ClarissaCdkStack" {
//!     owner "wandersoulz"
//!     branch "master"
//!     secret "arn:aws:secretsmanager:us-east-1:399907205041:secret:GitHubTokenString-bofHoJ"
//!     infra repo="ClarissaCDK"
//!     app repo="randomname-lambda"
//! }
//! ```

pub mod error;
pub mod release;

pub use error::{ConfigError, ConfigResult};
pub use release::{ReleaseConfig, load_release, parse_release};
