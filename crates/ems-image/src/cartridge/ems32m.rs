use crate::cartridge::Cartridge;

/// The 32 Mbit EMS cartridge, a single page
#[derive(Debug, Default, Clone)]
pub struct EMS32M;

impl Cartridge for EMS32M {
    fn page_size(&self) -> u32 {
        PAGE_SIZE_EMS32M
    }

    fn page_count(&self) -> u32 {
        1
    }

    fn name(&self) -> String {
        "ems32m".to_string()
    }
}

pub const PAGE_SIZE_EMS32M: u32 = 0x40_0000;
