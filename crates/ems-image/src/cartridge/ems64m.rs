use crate::cartridge::Cartridge;

/// The 64 Mbit EMS cartridge: two 32 Mbit pages
#[derive(Debug, Default, Clone)]
pub struct EMS64M;

impl Cartridge for EMS64M {
    fn page_size(&self) -> u32 {
        PAGE_SIZE_EMS64M
    }

    fn page_count(&self) -> u32 {
        PAGE_COUNT_EMS64M
    }

    fn name(&self) -> String {
        "ems64m".to_string()
    }
}

pub const PAGE_SIZE_EMS64M: u32 = 0x40_0000;
pub const PAGE_COUNT_EMS64M: u32 = 2;
