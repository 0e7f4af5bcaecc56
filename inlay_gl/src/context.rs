// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The render and resource context pair.

use std::fmt;
use std::sync::Arc;

use crate::api::{EglConfig, EglContext, EglSurface};
use crate::config::SurfaceConfig;
use crate::display::DisplayConnection;
use crate::error::SurfaceError;

/// Two contexts on one config: the render context, and a resource context
/// sharing its object namespace for uploads off the render thread.
///
/// Dropping the pair destroys the resource context, then the render context.
/// The display stays alive as long as anyone else holds it.
pub struct ContextPair {
    connection: Arc<DisplayConnection>,
    config: EglConfig,
    render: EglContext,
    resource: EglContext,
}

impl fmt::Debug for ContextPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPair")
            .field("config", &self.config)
            .field("render", &self.render)
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl ContextPair {
    /// Negotiates a config and creates both contexts.
    ///
    /// `share` is the host context the render context descends from, or
    /// [`EglContext::NO_CONTEXT`]. Nothing is left behind on failure.
    pub fn create(
        connection: Arc<DisplayConnection>,
        config: &SurfaceConfig,
        share: EglContext,
    ) -> Result<Self, SurfaceError> {
        let egl = connection.egl();
        let display = connection.display();

        let egl_config = egl
            .choose_config(display, &config.config_attributes())
            .map_err(SurfaceError::egl("eglChooseConfig"))?
            .ok_or(SurfaceError::NoMatchingConfig)?;
        egl.bind_gles_api()
            .map_err(SurfaceError::egl("eglBindAPI"))?;

        let attribs = config.context_attributes();
        let render = egl
            .create_context(display, egl_config, share, &attribs)
            .map_err(SurfaceError::egl("eglCreateContext"))?;
        let resource = match egl.create_context(display, egl_config, render, &attribs) {
            Ok(resource) => resource,
            Err(err) => {
                if let Err(cleanup) = egl.destroy_context(display, render) {
                    log::warn!("eglDestroyContext during unwind failed: {cleanup}");
                }
                return Err(SurfaceError::Egl {
                    call: "eglCreateContext",
                    source: err,
                });
            }
        };

        log::debug!("created render context {render:?} and resource context {resource:?}");
        Ok(Self {
            connection,
            config: egl_config,
            render,
            resource,
        })
    }

    /// Returns the render context.
    #[must_use]
    pub fn render(&self) -> EglContext {
        self.render
    }

    /// Returns the resource context.
    #[must_use]
    pub fn resource(&self) -> EglContext {
        self.resource
    }

    /// Returns the display connection.
    #[must_use]
    pub fn connection(&self) -> &Arc<DisplayConnection> {
        &self.connection
    }

    /// Binds the render context to the calling thread against `surface`.
    pub fn make_render_current(&self, surface: EglSurface) -> bool {
        self.bind(surface, self.render, "render")
    }

    /// Binds the resource context to the calling thread with no drawable.
    pub fn make_resource_current(&self) -> bool {
        self.bind(EglSurface::NO_SURFACE, self.resource, "resource")
    }

    /// Unbinds whatever context is current on the calling thread.
    pub fn clear_current(&self) -> bool {
        self.bind(EglSurface::NO_SURFACE, EglContext::NO_CONTEXT, "no")
    }

    /// Returns `true` if the render context is current on the calling thread.
    #[must_use]
    pub fn is_render_current(&self) -> bool {
        self.connection.egl().current_context() == self.render
    }

    fn bind(&self, surface: EglSurface, context: EglContext, which: &str) -> bool {
        match self
            .connection
            .egl()
            .make_current(self.connection.display(), surface, surface, context)
        {
            Ok(()) => true,
            Err(err) => {
                log::error!("eglMakeCurrent({which} context) failed: {err}");
                false
            }
        }
    }
}

impl Drop for ContextPair {
    fn drop(&mut self) {
        let egl = self.connection.egl();
        let display = self.connection.display();
        for (which, context) in [("resource", self.resource), ("render", self.render)] {
            if let Err(err) = egl.destroy_context(display, context) {
                log::warn!("eglDestroyContext({which}) failed: {err}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::GraphicsSubsystem;
    use crate::testing::FakeGl;

    fn connection(fake: &Arc<FakeGl>) -> (GraphicsSubsystem, Arc<DisplayConnection>) {
        let graphics = GraphicsSubsystem::new(fake.clone(), fake.clone());
        let connection = graphics.connection().unwrap();
        (graphics, connection)
    }

    #[test]
    fn resource_context_shares_with_render_context() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, connection) = connection(&fake);
        let host = fake.host_context();
        let pair = ContextPair::create(connection, &SurfaceConfig::gles2(), host).unwrap();

        assert_eq!(fake.share_of(pair.render()), Some(host));
        assert_eq!(fake.share_of(pair.resource()), Some(pair.render()));
    }

    #[test]
    fn current_ness_is_per_thread() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, connection) = connection(&fake);
        let pair = Arc::new(
            ContextPair::create(connection, &SurfaceConfig::gles2(), EglContext::NO_CONTEXT)
                .unwrap(),
        );

        assert!(pair.make_render_current(EglSurface::NO_SURFACE));
        assert!(pair.is_render_current(), "bound here");

        let other = Arc::clone(&pair);
        let seen_elsewhere = std::thread::spawn(move || {
            let before = other.is_render_current();
            assert!(other.make_resource_current());
            (before, other.connection().egl().current_context() == other.resource())
        })
        .join()
        .unwrap();
        assert_eq!(seen_elsewhere, (false, true));
        assert!(pair.is_render_current(), "still bound here");

        assert!(pair.clear_current());
        assert!(pair.clear_current(), "second clear still succeeds");
        assert!(!pair.is_render_current(), "unbound");
    }

    #[test]
    fn drop_destroys_resource_then_render() {
        let fake = Arc::new(FakeGl::new());
        let (_graphics, connection) = connection(&fake);
        let pair =
            ContextPair::create(connection, &SurfaceConfig::gles2(), EglContext::NO_CONTEXT)
                .unwrap();
        let (render, resource) = (pair.render(), pair.resource());
        drop(pair);
        assert_eq!(fake.destroyed_contexts(), vec![resource, render]);
    }

    #[test]
    fn config_negotiation_failure_is_fatal() {
        let fake = Arc::new(FakeGl::new());
        fake.fail_choose_config(true);
        let (_graphics, connection) = connection(&fake);
        assert!(matches!(
            ContextPair::create(connection, &SurfaceConfig::gles2(), EglContext::NO_CONTEXT),
            Err(SurfaceError::NoMatchingConfig)
        ));
        assert_eq!(fake.live_contexts(), 0);
    }

    #[test]
    fn failed_resource_context_unwinds_render_context() {
        let fake = Arc::new(FakeGl::new());
        fake.fail_context_creation_after(1);
        let (_graphics, connection) = connection(&fake);
        assert!(matches!(
            ContextPair::create(connection, &SurfaceConfig::gles2(), EglContext::NO_CONTEXT),
            Err(SurfaceError::Egl {
                call: "eglCreateContext",
                ..
            })
        ));
        assert_eq!(fake.live_contexts(), 0);
    }
}
