use std::ffi::CStr;

use apcam_core::MemoryStats;
use esp_idf_sys as sys;
use log::info;

pub fn log_chip_info() {
    let mut chip = sys::esp_chip_info_t::default();
    unsafe { sys::esp_chip_info(&mut chip) };
    info!(
        "Chip: model={} cores={} features=0x{:x} rev={}",
        chip.model, chip.cores, chip.features, chip.revision
    );

    let version = unsafe { CStr::from_ptr(sys::esp_get_idf_version()) };
    info!("IDF version: {}", version.to_string_lossy());
}

pub fn memory_stats() -> MemoryStats {
    let internal = sys::MALLOC_CAP_INTERNAL | sys::MALLOC_CAP_8BIT;
    let psram = sys::MALLOC_CAP_SPIRAM;
    unsafe {
        MemoryStats {
            free_internal: sys::heap_caps_get_free_size(internal),
            total_internal: sys::heap_caps_get_total_size(internal),
            free_psram: sys::heap_caps_get_free_size(psram),
            total_psram: sys::heap_caps_get_total_size(psram),
        }
    }
}

pub fn log_heap(label: &str) {
    let m = memory_stats();
    info!(
        "[{}] Heap INT: {}/{}  PSRAM: {}/{}",
        label, m.free_internal, m.total_internal, m.free_psram, m.total_psram
    );
}
