use crate::depth_texture::DepthTexture;
use rs_residency::demand::{PageDemandBuffer, TexturePageDemand};
use rs_residency::misc::{cast_any_as_u8_slice, cast_to_raw_buffer};
use rs_residency::residency::FrameResolveInput;
use rs_residency::settings::VirtualTextureSettings;
use wgpu::util::DeviceExt;
use wgpu::*;

/// The resolve pass runs at a fraction of the surface resolution; one
/// covered pixel per page is enough to demand it.
pub fn feed_back_size(settings: &VirtualTextureSettings, surface_size: glam::UVec2) -> glam::UVec2 {
    (surface_size / settings.feed_back_texture_div.max(1)).max(glam::UVec2::ONE)
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
struct Constants {
    model: glam::Mat4,
    view: glam::Mat4,
    projection: glam::Mat4,
    material_index: u32,
    total_pages_count: u32,
    _pad0: u32,
    _pad1: u32,
}

/// One depth tested draw feeding the resolve pass. `material_index` points
/// into the frame's material resolve records.
pub struct ResolveMesh<'a> {
    pub vertex_buffer: &'a Buffer,
    pub index_buffer: &'a Buffer,
    pub index_count: u32,
    pub model: glam::Mat4,
    pub material_index: u32,
}

/// Rasterizes visible geometry at reduced resolution and marks the page
/// each covered pixel would sample. The demand buffer holds one byte per
/// page; the shader sets byte lanes inside u32 words with `atomicOr` so
/// the host layout is preserved.
pub struct VirtualTextureResolvePass {
    settings: VirtualTextureSettings,
    render_pipeline: RenderPipeline,
    constants_bind_group_layout: BindGroupLayout,
    resolve_bind_group_layout: BindGroupLayout,
}

impl VirtualTextureResolvePass {
    pub fn new(device: &Device, settings: VirtualTextureSettings) -> VirtualTextureResolvePass {
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("VirtualTextureResolvePass.Shader"),
            source: ShaderSource::Wgsl(
                include_str!("shaders/virtual_texture_resolve.wgsl").into(),
            ),
        });

        let constants_bind_group_layout =
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("VirtualTextureResolvePass.ConstantsBindGroupLayout"),
                entries: &[BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let resolve_bind_group_layout =
            device.create_bind_group_layout(&BindGroupLayoutDescriptor {
                label: Some("VirtualTextureResolvePass.ResolveBindGroupLayout"),
                entries: &[
                    BindGroupLayoutEntry {
                        binding: 0,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Buffer {
                            ty: BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    BindGroupLayoutEntry {
                        binding: 1,
                        visibility: ShaderStages::FRAGMENT,
                        ty: BindingType::Buffer {
                            ty: BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("VirtualTextureResolvePass.PipelineLayout"),
            bind_group_layouts: &[&constants_bind_group_layout, &resolve_bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffer_layouts = [VertexBufferLayout {
            array_stride: (std::mem::size_of::<f32>() * 5) as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: &vertex_attr_array![0 => Float32x3, 1 => Float32x2],
        }];
        let render_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("VirtualTextureResolvePass.RenderPipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &vertex_buffer_layouts,
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[],
            }),
            primitive: PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
                stencil: StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        VirtualTextureResolvePass {
            settings,
            render_pipeline,
            constants_bind_group_layout,
            resolve_bind_group_layout,
        }
    }

    /// Depth attachment sized for this pass at the given surface size.
    pub fn create_depth_texture(&self, device: &Device, surface_size: glam::UVec2) -> DepthTexture {
        let size = feed_back_size(&self.settings, surface_size);
        DepthTexture::new(
            size.x,
            size.y,
            device,
            Some("VirtualTextureResolvePass.DepthTexture"),
        )
    }

    /// Run one resolve frame and read the demands back. Submit and wait:
    /// the caller gets one consistent frame of demands before any page
    /// loads happen.
    pub fn resolve(
        &self,
        device: &Device,
        queue: &Queue,
        depth_view: Option<&TextureView>,
        input: &FrameResolveInput,
        meshes: &[ResolveMesh],
        view: glam::Mat4,
        projection: glam::Mat4,
    ) -> crate::error::Result<Vec<TexturePageDemand>> {
        let Some(depth_view) = depth_view else {
            log::warn!("No depth attachment for the resolve pass, skipping this frame");
            return Ok(vec![]);
        };
        if input.total_pages_count == 0 || input.materials.is_empty() {
            return Ok(vec![]);
        }

        let material_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
            label: Some("VirtualTextureResolvePass.MaterialBuffer"),
            contents: cast_to_raw_buffer(&input.materials),
            usage: BufferUsages::STORAGE,
        });
        let demand_words_length = (input.total_pages_count.div_ceil(4) * 4) as u64;
        let demand_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("VirtualTextureResolvePass.DemandBuffer"),
            size: demand_words_length,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("VirtualTextureResolvePass.StagingBuffer"),
            size: demand_words_length,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let resolve_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("VirtualTextureResolvePass.ResolveBindGroup"),
            layout: &self.resolve_bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: material_buffer.as_entire_binding(),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: demand_buffer.as_entire_binding(),
                },
            ],
        });

        let mut constants_bind_groups: Vec<BindGroup> = Vec::with_capacity(meshes.len());
        for mesh in meshes {
            let constants = Constants {
                model: mesh.model,
                view,
                projection,
                material_index: mesh.material_index,
                total_pages_count: input.total_pages_count,
                _pad0: 0,
                _pad1: 0,
            };
            let uniform_buffer = device.create_buffer_init(&util::BufferInitDescriptor {
                label: None,
                contents: cast_any_as_u8_slice(&constants),
                usage: BufferUsages::UNIFORM,
            });
            constants_bind_groups.push(device.create_bind_group(&BindGroupDescriptor {
                label: None,
                layout: &self.constants_bind_group_layout,
                entries: &[BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            }));
        }

        let mut encoder = device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("VirtualTextureResolvePass.CommandEncoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("VirtualTextureResolvePass.RenderPass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.render_pipeline);
            render_pass.set_bind_group(1, &resolve_bind_group, &[]);
            for (mesh, constants_bind_group) in meshes.iter().zip(&constants_bind_groups) {
                render_pass.set_bind_group(0, constants_bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
        encoder.copy_buffer_to_buffer(&demand_buffer, 0, &staging_buffer, 0, demand_words_length);
        let submission_index = queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        buffer_slice.map_async(MapMode::Read, move |v| sender.send(v).unwrap());
        let _ = device.poll(Maintain::WaitForSubmissionIndex(submission_index));
        receiver
            .recv()
            .map_err(|err| crate::error::Error::Sync(Some(err.to_string())))?
            .map_err(|err| crate::error::Error::Sync(Some(err.to_string())))?;

        let mut demand_bytes = buffer_slice.get_mapped_range().to_vec();
        staging_buffer.unmap();
        demand_bytes.truncate(input.total_pages_count as usize);

        let demand = PageDemandBuffer::from_bytes(demand_bytes);
        Ok(demand.collect(&input.textures))
    }
}
