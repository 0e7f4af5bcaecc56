// Copyright 2026 the Inlay Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! [`ExternalImageDevice`] over the host's Vulkan device, using `ash`.

#![expect(unsafe_code, reason = "calling into the host's Vulkan device")]

use core::ffi::c_void;
use core::{fmt, mem};
use std::os::fd::{FromRawFd, OwnedFd};
use std::panic::{self, AssertUnwindSafe};

use ash::vk::{self, Handle};

use crate::error::SurfaceError;
use crate::interop::{ExternalImageDevice, InteropImage};
use crate::surface::{QueueAccessFn, VulkanHostHandles, VulkanTarget};

const COLOR_LAYERS: vk::ImageSubresourceLayers = vk::ImageSubresourceLayers {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    mip_level: 0,
    base_array_layer: 0,
    layer_count: 1,
};

const COLOR_RANGE: vk::ImageSubresourceRange = vk::ImageSubresourceRange {
    aspect_mask: vk::ImageAspectFlags::COLOR,
    base_mip_level: 0,
    level_count: 1,
    base_array_layer: 0,
    layer_count: 1,
};

fn vk_error(call: &'static str) -> impl FnOnce(vk::Result) -> SurfaceError {
    move |code| SurfaceError::Vulkan {
        call,
        code: code.as_raw(),
    }
}

fn raw_handle<H: Handle>(ptr: *mut c_void) -> H {
    H::from_raw(ptr as usize as u64)
}

/// Picks the first memory type allowed by `type_bits` that has `flags`.
fn memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    properties
        .memory_types
        .iter()
        .take(properties.memory_type_count as usize)
        .zip(0_u32..)
        .find(|(memory_type, index)| {
            type_bits & (1 << index) != 0 && memory_type.property_flags.contains(flags)
        })
        .map(|(_, index)| index)
}

/// Runs `f` inside the host's queue access callback.
fn with_host_queue<R>(
    access: QueueAccessFn,
    context: *mut c_void,
    f: impl FnOnce() -> R,
) -> Result<R, SurfaceError> {
    unsafe extern "C" fn trampoline(data: *mut c_void) {
        // SAFETY: `data` is the `&mut dyn FnMut()` below, live for the
        // duration of the host call.
        let run = unsafe { &mut *data.cast::<&mut dyn FnMut()>() };
        // Unwinding into the host would abort.
        if panic::catch_unwind(AssertUnwindSafe(|| (*run)())).is_err() {
            log::error!("panic inside the host queue access callback");
        }
    }

    let mut f = Some(f);
    let mut out = None;
    let mut call = || {
        if let Some(f) = f.take() {
            out = Some(f());
        }
    };
    let mut run: &mut dyn FnMut() = &mut call;
    // SAFETY: the host runs `trampoline(data)` before returning.
    unsafe { access(context, trampoline, (&raw mut run).cast::<c_void>()) };
    out.ok_or(SurfaceError::QueueAccessSkipped)
}

fn barrier(
    image: vk::Image,
    (old_layout, src_access): (vk::ImageLayout, vk::AccessFlags),
    (new_layout, dst_access): (vk::ImageLayout, vk::AccessFlags),
) -> vk::ImageMemoryBarrier<'static> {
    vk::ImageMemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(COLOR_RANGE)
}

/// Exportable images and copies on the host's device and queue.
///
/// The device, instance and queue belong to the host; only the command pool,
/// fence and images created here are destroyed by this type. Every submit
/// and wait goes through the host's queue access callback.
pub struct AshImageDevice {
    device: ash::Device,
    external_fd: ash::khr::external_memory_fd::Device,
    queue: vk::Queue,
    access_queue: QueueAccessFn,
    queue_context: *mut c_void,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    command_pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
}

impl fmt::Debug for AshImageDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AshImageDevice")
            .field("device", &self.device.handle())
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

// SAFETY: the host's queue access callback and its context may be used
// from any thread; the rest are Vulkan handles and ash function tables.
unsafe impl Send for AshImageDevice {}

impl AshImageDevice {
    /// Loads device entry points from the host's handles.
    ///
    /// Fails if the device lacks `VK_KHR_external_memory_fd` or the host
    /// gave no queue access callback.
    pub fn new(handles: &VulkanHostHandles) -> Result<Self, SurfaceError> {
        if handles.get_instance_proc_addr.is_null() {
            return Err(SurfaceError::MissingSymbol("vkGetInstanceProcAddr"));
        }
        let Some(access_queue) = handles.access_queue else {
            return Err(SurfaceError::MissingSymbol("queue access callback"));
        };
        // SAFETY: the host passes its `vkGetInstanceProcAddr`.
        let get_instance_proc_addr = unsafe {
            mem::transmute::<*const c_void, vk::PFN_vkGetInstanceProcAddr>(
                handles.get_instance_proc_addr,
            )
        };
        let static_fn = ash::StaticFn {
            get_instance_proc_addr,
        };
        let instance_handle: vk::Instance = raw_handle(handles.instance);
        let device_handle: vk::Device = raw_handle(handles.device);

        // SAFETY: the handles are live for as long as the host keeps the
        // plugin enabled, which outlasts this value.
        let instance = unsafe { ash::Instance::load(&static_fn, instance_handle) };
        // SAFETY: as above.
        let device = unsafe { ash::Device::load(instance.fp_v1_0(), device_handle) };

        // ash's extension loader substitutes panicking stubs for missing
        // entry points.
        // SAFETY: the name is NUL-terminated.
        let get_memory_fd =
            unsafe { instance.get_device_proc_addr(device_handle, c"vkGetMemoryFdKHR".as_ptr()) };
        if get_memory_fd.is_none() {
            return Err(SurfaceError::MissingExtension("VK_KHR_external_memory_fd"));
        }
        let external_fd = ash::khr::external_memory_fd::Device::new(&instance, &device);

        let physical_device: vk::PhysicalDevice = raw_handle(handles.physical_device);
        // SAFETY: the physical device belongs to `instance`.
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(handles.queue_family_index);
        // SAFETY: valid create info on a live device.
        let command_pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(vk_error("vkCreateCommandPool"))?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        // SAFETY: the pool was just created on this device.
        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => buffers[0],
            Err(code) => {
                // SAFETY: nothing was allocated from the pool.
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(vk_error("vkAllocateCommandBuffers")(code));
            }
        };

        // SAFETY: valid create info on a live device.
        let fence = match unsafe { device.create_fence(&vk::FenceCreateInfo::default(), None) } {
            Ok(fence) => fence,
            Err(code) => {
                // SAFETY: the buffer is not in use.
                unsafe { device.destroy_command_pool(command_pool, None) };
                return Err(vk_error("vkCreateFence")(code));
            }
        };

        log::debug!(
            "Vulkan interop ready on device {device_handle:?}, queue family {}",
            handles.queue_family_index
        );
        Ok(Self {
            device,
            external_fd,
            queue: raw_handle(handles.queue),
            access_queue,
            queue_context: handles.queue_context,
            memory_properties,
            command_pool,
            command_buffer,
            fence,
        })
    }

    fn with_queue<R>(&self, f: impl FnOnce(vk::Queue) -> R) -> Result<R, SurfaceError> {
        let queue = self.queue;
        with_host_queue(self.access_queue, self.queue_context, || f(queue))
    }

    /// Records with `record`, submits on the host queue and waits.
    fn submit_once(
        &self,
        record: impl FnOnce(&ash::Device, vk::CommandBuffer),
    ) -> Result<(), SurfaceError> {
        let cb = self.command_buffer;
        let begin =
            vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        // SAFETY: the previous submission was waited on, so the buffer and
        // fence are idle.
        unsafe {
            self.device
                .reset_fences(&[self.fence])
                .map_err(vk_error("vkResetFences"))?;
            self.device
                .reset_command_buffer(cb, vk::CommandBufferResetFlags::empty())
                .map_err(vk_error("vkResetCommandBuffer"))?;
            self.device
                .begin_command_buffer(cb, &begin)
                .map_err(vk_error("vkBeginCommandBuffer"))?;
        }
        record(&self.device, cb);
        let buffers = [cb];
        let submit = vk::SubmitInfo::default().command_buffers(&buffers);
        // SAFETY: the buffer is in the recording state.
        unsafe {
            self.device
                .end_command_buffer(cb)
                .map_err(vk_error("vkEndCommandBuffer"))?;
        }
        self.with_queue(|queue| {
            // SAFETY: the host holds off its own queue use for the duration
            // of the callback.
            unsafe { self.device.queue_submit(queue, &[submit], self.fence) }
        })?
        .map_err(vk_error("vkQueueSubmit"))?;
        // SAFETY: the fence belongs to this device.
        unsafe {
            self.device
                .wait_for_fences(&[self.fence], true, u64::MAX)
                .map_err(vk_error("vkWaitForFences"))?;
        }
        Ok(())
    }

    fn destroy(&self, image: vk::Image, memory: vk::DeviceMemory) {
        // SAFETY: callers guarantee neither is in use by the device.
        unsafe {
            self.device.destroy_image(image, None);
            if memory != vk::DeviceMemory::null() {
                self.device.free_memory(memory, None);
            }
        }
    }

    fn create_exportable(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(vk::Image, vk::DeviceMemory, u64), SurfaceError> {
        let mut external = vk::ExternalMemoryImageCreateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD);
        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(vk::Format::R8G8B8A8_UNORM)
            .extent(vk::Extent3D {
                width,
                height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(
                vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::SAMPLED
                    | vk::ImageUsageFlags::TRANSFER_SRC,
            )
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .push_next(&mut external);
        // SAFETY: valid create info on a live device.
        let image = unsafe { self.device.create_image(&image_info, None) }
            .map_err(vk_error("vkCreateImage"))?;

        // SAFETY: `image` was just created on this device.
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let Some(type_index) = memory_type_index(
            &self.memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        ) else {
            self.destroy(image, vk::DeviceMemory::null());
            return Err(SurfaceError::Vulkan {
                call: "vkAllocateMemory",
                code: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY.as_raw(),
            });
        };

        let mut export = vk::ExportMemoryAllocateInfo::default()
            .handle_types(vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD);
        let mut dedicated = vk::MemoryDedicatedAllocateInfo::default().image(image);
        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index)
            .push_next(&mut export)
            .push_next(&mut dedicated);
        // SAFETY: valid allocate info on a live device.
        let memory = match unsafe { self.device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(code) => {
                self.destroy(image, vk::DeviceMemory::null());
                return Err(vk_error("vkAllocateMemory")(code));
            }
        };
        // SAFETY: `memory` was sized from the image's requirements.
        if let Err(code) = unsafe { self.device.bind_image_memory(image, memory, 0) } {
            self.destroy(image, memory);
            return Err(vk_error("vkBindImageMemory")(code));
        }
        Ok((image, memory, requirements.size))
    }
}

impl ExternalImageDevice for AshImageDevice {
    fn allocate(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<(InteropImage, OwnedFd), SurfaceError> {
        let (image, memory, size) = self.create_exportable(width, height)?;

        let get_fd = vk::MemoryGetFdInfoKHR::default()
            .memory(memory)
            .handle_type(vk::ExternalMemoryHandleTypeFlags::OPAQUE_FD);
        // SAFETY: `memory` was allocated exportable as an opaque fd.
        let raw_fd = match unsafe { self.external_fd.get_memory_fd(&get_fd) } {
            Ok(fd) => fd,
            Err(code) => {
                self.destroy(image, memory);
                return Err(vk_error("vkGetMemoryFdKHR")(code));
            }
        };
        // SAFETY: vkGetMemoryFdKHR returns a new descriptor owned by the caller.
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        // GL renders into the image in GENERAL layout.
        let transitioned = self.submit_once(|device, cb| {
            let to_general = barrier(
                image,
                (vk::ImageLayout::UNDEFINED, vk::AccessFlags::empty()),
                (vk::ImageLayout::GENERAL, vk::AccessFlags::COLOR_ATTACHMENT_WRITE),
            );
            // SAFETY: `cb` is recording.
            unsafe {
                device.cmd_pipeline_barrier(
                    cb,
                    vk::PipelineStageFlags::TOP_OF_PIPE,
                    vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &[to_general],
                );
            }
        });
        if let Err(err) = transitioned {
            drop(fd);
            self.destroy(image, memory);
            return Err(err);
        }

        Ok((
            InteropImage {
                image: image.as_raw(),
                memory: memory.as_raw(),
                size,
                width,
                height,
            },
            fd,
        ))
    }

    fn copy_to_target(
        &mut self,
        image: &InteropImage,
        target: &VulkanTarget,
    ) -> Result<(), SurfaceError> {
        let src = vk::Image::from_raw(image.image);
        let dst = vk::Image::from_raw(target.image);
        let region = vk::ImageCopy {
            src_subresource: COLOR_LAYERS,
            src_offset: vk::Offset3D::default(),
            dst_subresource: COLOR_LAYERS,
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: image.width.min(target.width),
                height: image.height.min(target.height),
                depth: 1,
            },
        };

        self.submit_once(|device, cb| {
            let before = [
                barrier(
                    src,
                    (vk::ImageLayout::GENERAL, vk::AccessFlags::MEMORY_WRITE),
                    (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::AccessFlags::TRANSFER_READ),
                ),
                barrier(
                    dst,
                    (vk::ImageLayout::UNDEFINED, vk::AccessFlags::empty()),
                    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE),
                ),
            ];
            let after = [
                barrier(
                    src,
                    (vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::AccessFlags::TRANSFER_READ),
                    (vk::ImageLayout::GENERAL, vk::AccessFlags::MEMORY_WRITE),
                ),
                barrier(
                    dst,
                    (vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::AccessFlags::TRANSFER_WRITE),
                    (vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL, vk::AccessFlags::SHADER_READ),
                ),
            ];
            // SAFETY: `cb` is recording; both images are live.
            unsafe {
                device.cmd_pipeline_barrier(
                    cb,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &before,
                );
                device.cmd_copy_image(
                    cb,
                    src,
                    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                    dst,
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region],
                );
                device.cmd_pipeline_barrier(
                    cb,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::ALL_COMMANDS,
                    vk::DependencyFlags::empty(),
                    &[],
                    &[],
                    &after,
                );
            }
        })
    }

    fn wait_idle(&mut self) {
        // vkDeviceWaitIdle needs every queue of the device, the host's
        // included, externally synchronized.
        let waited = self.with_queue(|_| {
            // SAFETY: the host holds off its own queue use for the duration
            // of the callback.
            unsafe { self.device.device_wait_idle() }
        });
        match waited {
            Ok(Ok(())) => {}
            Ok(Err(code)) => log::warn!("vkDeviceWaitIdle failed: {code}"),
            Err(err) => log::warn!("device idle wait skipped: {err}"),
        }
    }

    fn release(&mut self, image: InteropImage) {
        self.destroy(
            vk::Image::from_raw(image.image),
            vk::DeviceMemory::from_raw(image.memory),
        );
    }
}

impl Drop for AshImageDevice {
    fn drop(&mut self) {
        self.wait_idle();
        // SAFETY: the device is idle, so neither object is in use.
        unsafe {
            self.device.destroy_fence(self.fence, None);
            self.device.destroy_command_pool(self.command_pool, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        for (index, &flags) in flags.iter().enumerate() {
            properties.memory_types[index].property_flags = flags;
        }
        properties.memory_type_count = u32::try_from(flags.len()).unwrap();
        properties
    }

    #[test]
    fn memory_type_respects_allowed_bits() {
        let props = properties(&[
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE,
        ]);
        let local = vk::MemoryPropertyFlags::DEVICE_LOCAL;
        assert_eq!(memory_type_index(&props, 0b111, local), Some(1));
        assert_eq!(memory_type_index(&props, 0b101, local), Some(2));
        assert_eq!(memory_type_index(&props, 0b001, local), None);
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let handles = VulkanHostHandles {
            get_instance_proc_addr: core::ptr::null(),
            instance: core::ptr::null_mut(),
            physical_device: core::ptr::null_mut(),
            device: core::ptr::null_mut(),
            queue: core::ptr::null_mut(),
            queue_family_index: 0,
            access_queue: None,
            queue_context: core::ptr::null_mut(),
        };
        assert!(matches!(
            AshImageDevice::new(&handles),
            Err(SurfaceError::MissingSymbol("vkGetInstanceProcAddr"))
        ));
    }

    unsafe extern "C" fn run_now(
        context: *mut c_void,
        callback: unsafe extern "C" fn(*mut c_void),
        data: *mut c_void,
    ) {
        // SAFETY: `context` points at the test's flag.
        let held = unsafe { &*context.cast::<core::sync::atomic::AtomicBool>() };
        held.store(true, core::sync::atomic::Ordering::SeqCst);
        // SAFETY: forwarding the pair handed to us.
        unsafe { callback(data) };
        held.store(false, core::sync::atomic::Ordering::SeqCst);
    }

    unsafe extern "C" fn never_run(
        _context: *mut c_void,
        _callback: unsafe extern "C" fn(*mut c_void),
        _data: *mut c_void,
    ) {
    }

    #[test]
    fn queue_work_runs_inside_the_host_callback() {
        let held = core::sync::atomic::AtomicBool::new(false);
        let context = (&raw const held).cast_mut().cast::<c_void>();
        let seen = with_host_queue(run_now, context, || {
            held.load(core::sync::atomic::Ordering::SeqCst)
        });
        assert!(seen.unwrap(), "work ran while the host held its queue");
        assert!(!held.load(core::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn skipped_callback_is_an_error() {
        let mut ran = false;
        let result = with_host_queue(never_run, core::ptr::null_mut(), || ran = true);
        assert!(matches!(result, Err(SurfaceError::QueueAccessSkipped)));
        assert!(!ran);
    }

    #[test]
    fn panicking_queue_work_does_not_unwind_into_the_host() {
        let held = core::sync::atomic::AtomicBool::new(false);
        let context = (&raw const held).cast_mut().cast::<c_void>();
        let result = with_host_queue(run_now, context, || -> u32 { panic!("submit failed") });
        assert!(matches!(result, Err(SurfaceError::QueueAccessSkipped)));
    }

    #[test]
    fn missing_queue_access_is_reported() {
        let handles = VulkanHostHandles {
            get_instance_proc_addr: 0x10 as *const c_void,
            instance: core::ptr::null_mut(),
            physical_device: core::ptr::null_mut(),
            device: core::ptr::null_mut(),
            queue: core::ptr::null_mut(),
            queue_family_index: 0,
            access_queue: None,
            queue_context: core::ptr::null_mut(),
        };
        assert!(matches!(
            AshImageDevice::new(&handles),
            Err(SurfaceError::MissingSymbol("queue access callback"))
        ));
    }
}
