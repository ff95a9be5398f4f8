//! One-shot startup model selection (SPEC_FULL.md §4.5 table).

use sidecar_stt::types::ModelSize;

use crate::gpu::GpuInfo;

pub fn select_initial_model(gpu: &GpuInfo, total_ram_gb: f64) -> ModelSize {
    if gpu.present && total_ram_gb >= 8.0 && gpu.vram_gb >= 10.0 {
        return ModelSize::LargeV3;
    }
    if gpu.present && total_ram_gb >= 4.0 && gpu.vram_gb >= 5.0 {
        return ModelSize::Medium;
    }
    if total_ram_gb >= 4.0 {
        return ModelSize::Small;
    }
    if total_ram_gb >= 2.0 {
        return ModelSize::Base;
    }
    ModelSize::Tiny
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_end_gpu_system_selects_large_v3() {
        let gpu = GpuInfo {
            present: true,
            vram_gb: 12.0,
        };
        assert_eq!(select_initial_model(&gpu, 16.0), ModelSize::LargeV3);
    }

    #[test]
    fn gpu_present_but_insufficient_vram_falls_back_to_cpu_rule() {
        let gpu = GpuInfo {
            present: true,
            vram_gb: 2.0,
        };
        assert_eq!(select_initial_model(&gpu, 16.0), ModelSize::Small);
    }

    #[test]
    fn low_memory_cpu_only_selects_tiny() {
        let gpu = GpuInfo {
            present: false,
            vram_gb: 0.0,
        };
        assert_eq!(select_initial_model(&gpu, 1.0), ModelSize::Tiny);
    }
}
