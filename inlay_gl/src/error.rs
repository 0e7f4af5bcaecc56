// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors from surface and context setup.

use crate::api::EglError;
use crate::surface::GraphicsBackend;

/// A fatal failure while setting up or rebuilding GPU surfaces.
///
/// None of these are retried; the caller abandons the operation.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// None of the candidate library names could be opened.
    #[error("could not load {kind} from any of {tried:?}")]
    LibraryNotFound {
        /// `"EGL"` or `"GLES"`.
        kind: &'static str,
        /// The names that were tried.
        tried: Vec<String>,
    },
    /// A required entry point is missing from a loaded library.
    #[error("missing entry point {0}")]
    MissingSymbol(&'static str),
    /// An EGL call failed.
    #[error("{call} failed: {source}")]
    Egl {
        /// The failing call.
        call: &'static str,
        /// The EGL error code.
        source: EglError,
    },
    /// The render context could not be bound to the calling thread.
    #[error("could not make the render context current")]
    ContextUnavailable,
    /// No EGL config matches the requested attributes.
    #[error("no EGL config matches the requested attributes")]
    NoMatchingConfig,
    /// The framebuffer is not complete after attaching the target.
    #[error("framebuffer incomplete (status {0:#x})")]
    IncompleteFramebuffer(u32),
    /// The render target kind does not match the selected backend.
    #[error("render target does not match the {0:?} backend")]
    TargetMismatch(GraphicsBackend),
    /// A required driver extension is unavailable.
    #[error("required extension {0} is unavailable")]
    MissingExtension(&'static str),
    /// A Vulkan call failed.
    #[error("{call} failed with VkResult {code}")]
    Vulkan {
        /// The failing call.
        call: &'static str,
        /// The raw `VkResult`.
        code: i32,
    },
    /// The host returned from its queue access callback without running the
    /// plugin's work.
    #[error("host skipped the queue access callback")]
    QueueAccessSkipped,
    /// The host's graphics backend cannot be served on this build.
    #[error("unsupported graphics backend: {0}")]
    UnsupportedBackend(&'static str),
}

impl SurfaceError {
    pub(crate) fn egl(call: &'static str) -> impl FnOnce(EglError) -> Self {
        move |source| Self::Egl { call, source }
    }
}
