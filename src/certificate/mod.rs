//! Certificate issuance and public verification.

pub mod issuer;
pub mod verify;

pub use issuer::{content_hash, CertificateIssuer, CertificatePayload, IssueError};
pub use verify::{
    CertificatePublicView, ChainConfirmation, VerificationResult, VerificationService, VerifyError,
};
