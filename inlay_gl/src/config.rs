// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surface configuration presets.

use crate::api::{
    EGL_ALPHA_SIZE, EGL_BLUE_SIZE, EGL_CONTEXT_CLIENT_VERSION, EGL_DEPTH_SIZE, EGL_GREEN_SIZE,
    EGL_NONE, EGL_OPENGL_ES2_BIT, EGL_RED_SIZE, EGL_RENDERABLE_TYPE, EGL_STENCIL_SIZE,
    EGL_SURFACE_TYPE, EGL_WINDOW_BIT,
};

/// Builds an `EGL_NONE`-terminated attribute list from pairs.
fn attrs(pairs: &[(i32, i32)]) -> Vec<i32> {
    let mut list = Vec::with_capacity(pairs.len() * 2 + 1);
    for &(key, value) in pairs {
        list.push(key);
        list.push(value);
    }
    list.push(EGL_NONE);
    list
}

/// Configuration for display, context and surface creation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Red, green, blue and alpha channel bits.
    pub color_bits: [i32; 4],
    /// Depth buffer bits.
    pub depth_bits: i32,
    /// Stencil buffer bits.
    pub stencil_bits: i32,
    /// Require window-surface capable configs.
    pub window_surface: bool,
    /// `EGL_CONTEXT_CLIENT_VERSION` for both contexts.
    pub client_version: i32,
    /// EGL library names tried in order.
    pub egl_libraries: Vec<String>,
    /// GLES library names tried in order.
    pub gles_libraries: Vec<String>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self::gles2()
    }
}

impl SurfaceConfig {
    /// GLES 2 with RGBA 8-8-8-8, no depth or stencil, window-surface capable.
    #[must_use]
    pub fn gles2() -> Self {
        let (egl, gles): (&[&str], &[&str]) = if cfg!(windows) {
            (&["libEGL.dll"], &["libGLESv2.dll"])
        } else {
            (&["libEGL.so.1", "libEGL.so"], &["libGLESv2.so.2", "libGLESv2.so"])
        };
        Self {
            color_bits: [8, 8, 8, 8],
            depth_bits: 0,
            stencil_bits: 0,
            window_surface: true,
            client_version: 2,
            egl_libraries: egl.iter().map(|s| (*s).to_owned()).collect(),
            gles_libraries: gles.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// The `eglChooseConfig` attribute list.
    #[must_use]
    pub fn config_attributes(&self) -> Vec<i32> {
        let [r, g, b, a] = self.color_bits;
        let mut pairs = vec![(EGL_RENDERABLE_TYPE, EGL_OPENGL_ES2_BIT)];
        if self.window_surface {
            pairs.push((EGL_SURFACE_TYPE, EGL_WINDOW_BIT));
        }
        pairs.extend([
            (EGL_RED_SIZE, r),
            (EGL_GREEN_SIZE, g),
            (EGL_BLUE_SIZE, b),
            (EGL_ALPHA_SIZE, a),
            (EGL_DEPTH_SIZE, self.depth_bits),
            (EGL_STENCIL_SIZE, self.stencil_bits),
        ]);
        attrs(&pairs)
    }

    /// The `eglCreateContext` attribute list.
    #[must_use]
    pub fn context_attributes(&self) -> Vec<i32> {
        attrs(&[(EGL_CONTEXT_CLIENT_VERSION, self.client_version)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gles2_attributes_match_fixed_set() {
        let config = SurfaceConfig::gles2();
        assert_eq!(
            config.config_attributes(),
            vec![
                EGL_RENDERABLE_TYPE,
                EGL_OPENGL_ES2_BIT,
                EGL_SURFACE_TYPE,
                EGL_WINDOW_BIT,
                EGL_RED_SIZE,
                8,
                EGL_GREEN_SIZE,
                8,
                EGL_BLUE_SIZE,
                8,
                EGL_ALPHA_SIZE,
                8,
                EGL_DEPTH_SIZE,
                0,
                EGL_STENCIL_SIZE,
                0,
                EGL_NONE,
            ]
        );
        assert_eq!(
            config.context_attributes(),
            vec![EGL_CONTEXT_CLIENT_VERSION, 2, EGL_NONE]
        );
    }

    #[test]
    fn library_names_are_platform_specific() {
        let config = SurfaceConfig::default();
        assert!(!config.egl_libraries.is_empty(), "egl names present");
        assert!(!config.gles_libraries.is_empty(), "gles names present");
        if cfg!(windows) {
            assert_eq!(config.egl_libraries[0], "libEGL.dll");
        } else {
            assert_eq!(config.egl_libraries[0], "libEGL.so.1");
        }
    }
}
