//! Compute context - one device and its queue, acquired once per run.

use log::{debug, info};

use super::GpuError;
use crate::schema::RenderConfig;

/// Adapter selection rules.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions {
    /// Accept CPU/software adapters.
    pub allow_software_adapter: bool,
    /// Case-insensitive substring the adapter name must contain.
    pub adapter_name: Option<String>,
}

impl BackendOptions {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            allow_software_adapter: config.allow_software_adapter,
            adapter_name: config.adapter_name.clone(),
        }
    }

    fn check(&self, name: &str, device_type: wgpu::DeviceType) -> Result<(), GpuError> {
        let rejected = |reason| GpuError::AdapterRejected {
            name: name.to_string(),
            device_type: format!("{device_type:?}"),
            reason,
        };

        if device_type == wgpu::DeviceType::Cpu && !self.allow_software_adapter {
            return Err(rejected("software adapters are not allowed"));
        }
        if let Some(filter) = &self.adapter_name {
            if !name.to_lowercase().contains(&filter.to_lowercase()) {
                return Err(rejected("name does not match the adapter filter"));
            }
        }
        Ok(())
    }

    /// Pick the best acceptable candidate.
    ///
    /// Hardware adapters rank ahead of virtual and software ones; ties keep
    /// enumeration order. Fails with the last rejection, or `NoAdapter` if
    /// there were no candidates at all.
    pub fn select<T>(
        &self,
        candidates: Vec<T>,
        describe: impl Fn(&T) -> (String, wgpu::DeviceType),
    ) -> Result<T, GpuError> {
        let mut rejection = None;
        let mut best: Option<(u8, T)> = None;

        for candidate in candidates {
            let (name, device_type) = describe(&candidate);
            match self.check(&name, device_type) {
                Ok(()) => {
                    let rank = device_rank(device_type);
                    if best.as_ref().is_none_or(|(r, _)| rank < *r) {
                        best = Some((rank, candidate));
                    }
                }
                Err(e) => {
                    debug!("{e}");
                    rejection = Some(e);
                }
            }
        }

        match best {
            Some((_, candidate)) => Ok(candidate),
            None => Err(rejection.unwrap_or(GpuError::NoAdapter)),
        }
    }
}

fn device_rank(device_type: wgpu::DeviceType) -> u8 {
    match device_type {
        wgpu::DeviceType::DiscreteGpu => 0,
        wgpu::DeviceType::IntegratedGpu => 1,
        wgpu::DeviceType::VirtualGpu => 2,
        wgpu::DeviceType::Other => 3,
        wgpu::DeviceType::Cpu => 4,
    }
}

/// Device and queue shared by every GPU component.
///
/// Resources are released when the context is dropped, so early returns
/// release the device too. `release` does the same explicitly.
pub struct ComputeContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
}

impl ComputeContext {
    /// Acquire one compute device.
    pub async fn acquire(options: &BackendOptions) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all()).await;
        for adapter in &adapters {
            let info = adapter.get_info();
            debug!(
                "Found adapter \"{}\" ({:?}, {:?})",
                info.name, info.device_type, info.backend
            );
        }

        let adapter = options.select(adapters, |adapter| {
            let info = adapter.get_info();
            (info.name, info.device_type)
        })?;

        let adapter_info = adapter.get_info();
        info!(
            "Using adapter \"{}\" ({:?}, {:?})",
            adapter_info.name, adapter_info.device_type, adapter_info.backend
        );

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Particle Canvas GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Allocate a buffer, failing if it exceeds the device limits.
    pub fn create_buffer(
        &self,
        label: &'static str,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> Result<wgpu::Buffer, GpuError> {
        let limits = self.device.limits();
        let mut limit = limits.max_buffer_size;
        if usage.contains(wgpu::BufferUsages::STORAGE) {
            limit = limit.min(limits.max_storage_buffer_binding_size as u64);
        }
        if size == 0 || size > limit {
            return Err(GpuError::BufferAllocation { label, size, limit });
        }

        debug!("Allocating {label}: {size} bytes");
        Ok(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        }))
    }

    pub fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    pub fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Block until `staging` is mapped, then copy its contents out.
    ///
    /// The copy into `staging` must already be submitted.
    pub fn map_read<T: bytemuck::Pod>(&self, staging: &wgpu::Buffer) -> Result<Vec<T>, GpuError> {
        let buffer_slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        self.device.poll(wgpu::PollType::wait_indefinitely())?;
        rx.recv().map_err(|_| GpuError::ReadbackAborted)??;

        let values = {
            let data = buffer_slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&data).to_vec()
        };
        staging.unmap();

        Ok(values)
    }

    /// Copy a whole storage buffer back to the host through a temporary
    /// staging buffer.
    pub fn read_buffer<T: bytemuck::Pod>(&self, source: &wgpu::Buffer) -> Result<Vec<T>, GpuError> {
        let staging = self.create_buffer(
            "Readback Staging Buffer",
            source.size(),
            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        )?;

        let mut encoder = self.encoder("Readback Encoder");
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, source.size());
        self.submit(encoder);

        self.map_read(&staging)
    }

    /// Release the device. Waits for submitted work first.
    pub fn release(self) {
        self.device.poll(wgpu::PollType::wait_indefinitely()).ok();
        info!("Released adapter \"{}\"", self.adapter_info.name);
        self.device.destroy();
    }
}
