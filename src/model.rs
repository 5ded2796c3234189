//! Calculator model identities and their memory/hardware constants.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalcModel {
    Ti73,
    Ti82,
    Ti83,
    Ti83Plus,
    Ti83PlusSe,
    Ti84Plus,
    Ti84PlusSe,
    Ti84PlusCse,
    Ti85,
    Ti86,
}

/// Per-model memory layout
#[derive(Debug, Clone, Copy)]
pub struct ModelSpec {
    pub flash_pages: usize,
    pub ram_pages: usize,
    pub flash_version: u8,
    /// Byte returned by the model-ID port (0x15)
    pub model_id: u8,
}

impl CalcModel {
    pub fn spec(self) -> ModelSpec {
        match self {
            CalcModel::Ti83 => ModelSpec {
                flash_pages: 4,
                ram_pages: 2,
                flash_version: 1,
                model_id: 0x00,
            },
            CalcModel::Ti83Plus => ModelSpec {
                flash_pages: 32,
                ram_pages: 2,
                flash_version: 1,
                model_id: 0x33,
            },
            CalcModel::Ti83PlusSe => ModelSpec {
                flash_pages: 128,
                ram_pages: 8,
                flash_version: 2,
                model_id: 0x33,
            },
            CalcModel::Ti84Plus => ModelSpec {
                flash_pages: 64,
                ram_pages: 8,
                flash_version: 3,
                model_id: 0x44,
            },
            CalcModel::Ti84PlusSe => ModelSpec {
                flash_pages: 128,
                ram_pages: 8,
                flash_version: 2,
                model_id: 0x44,
            },
            CalcModel::Ti84PlusCse => ModelSpec {
                flash_pages: 256,
                ram_pages: 8,
                flash_version: 2,
                model_id: 0x45,
            },
            // No port/bank wiring is implemented for these
            CalcModel::Ti73 | CalcModel::Ti82 | CalcModel::Ti85 | CalcModel::Ti86 => ModelSpec {
                flash_pages: 0,
                ram_pages: 0,
                flash_version: 0,
                model_id: 0x00,
            },
        }
    }

    /// SE-line hardware: crystal timers, delay ports, clock, USB, MD5
    pub fn has_se_aux(self) -> bool {
        matches!(
            self,
            CalcModel::Ti83PlusSe | CalcModel::Ti84PlusSe | CalcModel::Ti84PlusCse
        )
    }

    /// 84+ keeps the SE aux block behind a smaller flash
    pub fn is_83p_family(self) -> bool {
        matches!(
            self,
            CalcModel::Ti83Plus
                | CalcModel::Ti83PlusSe
                | CalcModel::Ti84Plus
                | CalcModel::Ti84PlusSe
                | CalcModel::Ti84PlusCse
        )
    }

    pub fn has_color_lcd(self) -> bool {
        self == CalcModel::Ti84PlusCse
    }
}

impl fmt::Display for CalcModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalcModel::Ti73 => "TI-73",
            CalcModel::Ti82 => "TI-82",
            CalcModel::Ti83 => "TI-83",
            CalcModel::Ti83Plus => "TI-83 Plus",
            CalcModel::Ti83PlusSe => "TI-83 Plus SE",
            CalcModel::Ti84Plus => "TI-84 Plus",
            CalcModel::Ti84PlusSe => "TI-84 Plus SE",
            CalcModel::Ti84PlusCse => "TI-84 Plus CSE",
            CalcModel::Ti85 => "TI-85",
            CalcModel::Ti86 => "TI-86",
        };
        f.write_str(name)
    }
}
