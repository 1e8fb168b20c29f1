use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// The single sandbox filesystem entry every cartridge is written to.
pub const CARTRIDGE_PATH: &str = "rom.nes";

const INES_MAGIC: &[u8; 4] = b"NES\x1A";
const INES_HEADER_LEN: usize = 16;
const PRG_BANK_SIZE: usize = 0x4000;
const CHR_BANK_SIZE: usize = 0x2000;

/// An immutable cartridge image together with the name the user picked it under.
///
/// Cloning is cheap: the bytes are shared, never copied, until they cross into the sandbox.
#[derive(Clone, PartialEq, Eq)]
pub struct CartridgeBlob {
    name: String,
    bytes: Rc<[u8]>,
}

impl CartridgeBlob {
    pub fn new(name: impl Into<String>, bytes: impl Into<Rc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn header(&self) -> Option<InesHeader> {
        InesHeader::parse(&self.bytes)
    }

    /// One-line description used when announcing a successful load.
    pub fn summary(&self) -> String {
        match self.header() {
            Some(header) => format!("{} ({} bytes, {header})", self.name, self.len()),
            None => format!("{} ({} bytes, no iNES header)", self.name, self.len()),
        }
    }
}

impl std::fmt::Debug for CartridgeBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartridgeBlob")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

impl std::fmt::Display for Mirroring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mirroring::Horizontal => write!(f, "horizontal"),
            Mirroring::Vertical => write!(f, "vertical"),
            Mirroring::FourScreen => write!(f, "four-screen"),
        }
    }
}

/// iNES 1.0 header fields. Only read for diagnostics; the bytes handed to the sandbox are
/// never touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InesHeader {
    pub prg_banks: u8,
    pub chr_banks: u8,
    pub mapper: u8,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub trainer: bool,
}

impl InesHeader {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let header = bytes.get(..INES_HEADER_LEN)?;
        if &header[..4] != INES_MAGIC {
            return None;
        }
        let flags6 = header[6];
        let flags7 = header[7];
        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        };
        Some(Self {
            prg_banks: header[4],
            chr_banks: header[5],
            mapper: (flags6 >> 4) | (flags7 & 0xF0),
            mirroring,
            battery: flags6 & 0x02 != 0,
            trainer: flags6 & 0x04 != 0,
        })
    }

    pub fn prg_rom_size(&self) -> usize {
        self.prg_banks as usize * PRG_BANK_SIZE
    }

    /// Zero CHR banks means the board uses CHR RAM.
    pub fn chr_rom_size(&self) -> usize {
        self.chr_banks as usize * CHR_BANK_SIZE
    }
}

impl std::fmt::Display for InesHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "mapper {}, {} KiB PRG, ",
            self.mapper,
            self.prg_rom_size() / 1024
        )?;
        if self.chr_banks == 0 {
            write!(f, "CHR RAM")?;
        } else {
            write!(f, "{} KiB CHR", self.chr_rom_size() / 1024)?;
        }
        write!(f, ", {} mirroring", self.mirroring)?;
        if self.battery {
            write!(f, ", battery")?;
        }
        if self.trainer {
            write!(f, ", trainer")?;
        }
        Ok(())
    }
}
