use log::warn;
use thiserror::Error;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Problems detected while inspecting a ROM image. None of them prevent a
/// cartridge from being constructed; `Cartridge::load` falls back to a
/// best-effort mapper and records the degradation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartridgeError {
    #[error("ROM image is truncated ({0} bytes, header needs 0x150)")]
    Truncated(usize),
    #[error("unsupported mapper type {0:#04X}")]
    UnsupportedMapper(u8),
    #[error("header checksum mismatch (computed {computed:#04X}, stored {stored:#04X})")]
    HeaderChecksum { computed: u8, stored: u8 },
    #[error("ROM shorter than its header size code {code:#04X} claims")]
    SizeMismatch { code: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MbcKind {
    NoMbc,
    Mbc1,
    Mbc2,
    Mbc3,
    Mbc5,
}

impl MbcKind {
    pub fn tag(self) -> u8 {
        match self {
            MbcKind::NoMbc => 0,
            MbcKind::Mbc1 => 1,
            MbcKind::Mbc2 => 2,
            MbcKind::Mbc3 => 3,
            MbcKind::Mbc5 => 5,
        }
    }
}

/// Mapper registers. One variant per supported controller; the active
/// variant is chosen from the header at load time.
#[derive(Debug)]
enum Mapper {
    NoMbc,
    Mbc1 {
        rom_bank: u8,
        ram_bank: u8,
        mode: u8,
        ram_enable: bool,
    },
    Mbc2 {
        rom_bank: u8,
        ram_enable: bool,
    },
    Mbc3 {
        rom_bank: u8,
        ram_bank: u8,
        ram_enable: bool,
        latch_pending: bool,
        rtc: Option<Rtc>,
    },
    Mbc5 {
        rom_bank: u16,
        ram_bank: u8,
        ram_enable: bool,
    },
}

/// MBC3 real-time clock, driven purely by emulated cycles so equal inputs
/// replay to identical state.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rtc {
    seconds: u8,
    minutes: u8,
    hours: u8,
    /// 9-bit day counter.
    days: u16,
    halt: bool,
    /// Day counter overflow.
    carry: bool,
    latched: [u8; 5],
    subsecond_cycles: u32,
}

const RTC_CYCLES_PER_SECOND: u32 = 4_194_304;

impl Rtc {
    fn control_byte(&self) -> u8 {
        let mut out = ((self.days >> 8) as u8) & 0x01;
        if self.halt {
            out |= 0x40;
        }
        if self.carry {
            out |= 0x80;
        }
        out
    }

    fn latch(&mut self) {
        self.latched = [
            self.seconds & 0x3F,
            self.minutes & 0x3F,
            self.hours & 0x1F,
            (self.days & 0x00FF) as u8,
            self.control_byte(),
        ];
    }

    fn read_latched(&self, reg: u8) -> u8 {
        match reg {
            0x08..=0x0C => self.latched[(reg - 0x08) as usize],
            _ => 0xFF,
        }
    }

    fn write_register(&mut self, reg: u8, val: u8) {
        match reg {
            0x08 => {
                self.seconds = val & 0x3F;
                self.subsecond_cycles = 0;
            }
            0x09 => self.minutes = val & 0x3F,
            0x0A => self.hours = val & 0x1F,
            0x0B => self.days = (self.days & 0x0100) | val as u16,
            0x0C => {
                self.days = (self.days & 0x00FF) | (((val & 0x01) as u16) << 8);
                self.halt = val & 0x40 != 0;
                self.carry = val & 0x80 != 0;
            }
            _ => {}
        }
        self.latch();
    }

    fn step(&mut self, cycles: u32) {
        if self.halt {
            return;
        }
        self.subsecond_cycles += cycles;
        while self.subsecond_cycles >= RTC_CYCLES_PER_SECOND {
            self.subsecond_cycles -= RTC_CYCLES_PER_SECOND;
            self.second_tick();
        }
    }

    fn second_tick(&mut self) {
        self.seconds = (self.seconds + 1) & 0x3F;
        if self.seconds != 60 {
            return;
        }
        self.seconds = 0;
        self.minutes = (self.minutes + 1) & 0x3F;
        if self.minutes != 60 {
            return;
        }
        self.minutes = 0;
        self.hours = (self.hours + 1) & 0x1F;
        if self.hours != 24 {
            return;
        }
        self.hours = 0;
        if self.days == 0x01FF {
            self.days = 0;
            self.carry = true;
        } else {
            self.days += 1;
        }
    }

    fn save_state(&self, out: &mut Vec<u8>) {
        out.push(self.seconds);
        out.push(self.minutes);
        out.push(self.hours);
        out.extend_from_slice(&self.days.to_le_bytes());
        out.push((self.halt as u8) | ((self.carry as u8) << 1));
        out.extend_from_slice(&self.latched);
        out.extend_from_slice(&self.subsecond_cycles.to_le_bytes());
    }

    fn load_state(&mut self, data: &[u8]) {
        self.seconds = data[0] & 0x3F;
        self.minutes = data[1] & 0x3F;
        self.hours = data[2] & 0x1F;
        self.days = u16::from_le_bytes([data[3], data[4]]) & 0x01FF;
        self.halt = data[5] & 0x01 != 0;
        self.carry = data[5] & 0x02 != 0;
        self.latched.copy_from_slice(&data[6..11]);
        self.subsecond_cycles = u32::from_le_bytes([data[11], data[12], data[13], data[14]])
            .min(RTC_CYCLES_PER_SECOND - 1);
    }

    const STATE_LEN: usize = 15;
}

pub struct Cartridge {
    pub rom: Vec<u8>,
    pub ram: Vec<u8>,
    pub kind: MbcKind,
    pub cgb: bool,
    pub title: String,
    cart_type: u8,
    /// Header problems found at load time; the cartridge still works with a
    /// best-effort mapper.
    degraded: Vec<CartridgeError>,
    mapper: Mapper,
}

impl Cartridge {
    /// Build a cartridge from a raw ROM image. Header problems are logged
    /// and recorded (see [`Cartridge::degradations`]) rather than refused;
    /// a failing checksum or unknown mapper byte gets a best-effort fallback
    /// the way real hardware just runs whatever is in the slot.
    pub fn load(data: Vec<u8>) -> Self {
        let header = Header::parse(&data);
        let degraded = header.validate();
        for problem in &degraded {
            warn!("cartridge header: {problem}");
        }

        let kind = header.mbc_kind();
        let cart_type = header.cart_type();
        let has_rtc = header.has_rtc();
        let mapper = match kind {
            MbcKind::NoMbc => Mapper::NoMbc,
            MbcKind::Mbc1 => Mapper::Mbc1 {
                rom_bank: 1,
                ram_bank: 0,
                mode: 0,
                ram_enable: false,
            },
            MbcKind::Mbc2 => Mapper::Mbc2 {
                rom_bank: 1,
                ram_enable: false,
            },
            MbcKind::Mbc3 => Mapper::Mbc3 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
                latch_pending: false,
                rtc: if has_rtc { Some(Rtc::default()) } else { None },
            },
            MbcKind::Mbc5 => Mapper::Mbc5 {
                rom_bank: 1,
                ram_bank: 0,
                ram_enable: false,
            },
        };

        let ram_size = header.ram_size();
        let cgb = header.cgb_supported();
        let title = header.title();

        Self {
            rom: data,
            ram: vec![0; ram_size],
            kind,
            cgb,
            title,
            cart_type,
            degraded,
            mapper,
        }
    }

    /// Like [`Cartridge::load`] but with an explicit RAM size, for synthetic
    /// images whose header carries no RAM code.
    pub fn from_bytes_with_ram(data: Vec<u8>, ram_size: usize) -> Self {
        let mut cart = Self::load(data);
        cart.ram = vec![0; ram_size];
        cart
    }

    /// Header problems found at load time. Empty for a well-formed image.
    pub fn degradations(&self) -> &[CartridgeError] {
        &self.degraded
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E
        )
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.cart_type, 0x0F | 0x10 | 0x13)
    }

    /// Battery-backed external RAM, if this cartridge has any. The host
    /// persists and restores this buffer; the core does no file I/O.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        if self.has_battery() && !self.ram.is_empty() {
            Some(&self.ram)
        } else {
            None
        }
    }

    /// Restore previously persisted battery RAM. Extra bytes are ignored,
    /// short buffers fill what they cover.
    pub fn load_battery_ram(&mut self, data: &[u8]) {
        for (dst, src) in self.ram.iter_mut().zip(data.iter()) {
            *dst = *src;
        }
    }

    /// Advance the RTC, if present, by CPU clock cycles.
    pub fn step_rtc(&mut self, cycles: u16) {
        if let Mapper::Mbc3 { rtc: Some(rtc), .. } = &mut self.mapper {
            rtc.step(cycles as u32);
        }
    }

    pub fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => self.read_rom(addr),
            0xA000..=0xBFFF => self.read_ram(addr),
            _ => 0xFF,
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => self.write_control(addr, val),
            0xA000..=0xBFFF => self.write_ram(addr, val),
            _ => {}
        }
    }

    fn rom_bank_count(&self) -> usize {
        (self.rom.len() / ROM_BANK_SIZE).max(1)
    }

    fn rom_at(&self, bank: usize, offset: usize) -> u8 {
        self.rom
            .get(bank * ROM_BANK_SIZE + offset)
            .copied()
            .unwrap_or(0xFF)
    }

    /// Bank mapped at 0x0000-0x3FFF. Only MBC1 mode 1 moves it off bank 0.
    fn low_rom_bank(&self) -> usize {
        match &self.mapper {
            Mapper::Mbc1 {
                ram_bank, mode: 1, ..
            } => (((*ram_bank as usize) & 0x03) << 5) % self.rom_bank_count(),
            _ => 0,
        }
    }

    /// Bank mapped at 0x4000-0x7FFF. Never bank 0 except on MBC5, where
    /// bank 0 is a valid selection.
    fn high_rom_bank(&self) -> usize {
        let count = self.rom_bank_count();
        match &self.mapper {
            Mapper::NoMbc => 1,
            Mapper::Mbc1 {
                rom_bank, ram_bank, ..
            } => {
                let mut bank = (((*ram_bank as usize) & 0x03) << 5) | (*rom_bank as usize & 0x1F);
                if bank & 0x1F == 0 {
                    bank += 1;
                }
                bank % count
            }
            Mapper::Mbc2 { rom_bank, .. } => {
                let bank = (*rom_bank as usize & 0x0F).max(1);
                bank % count
            }
            Mapper::Mbc3 { rom_bank, .. } => {
                let bank = (*rom_bank as usize & 0x7F).max(1);
                bank % count
            }
            Mapper::Mbc5 { rom_bank, .. } => (*rom_bank as usize & 0x1FF) % count,
        }
    }

    fn read_rom(&self, addr: u16) -> u8 {
        if addr < 0x4000 {
            self.rom_at(self.low_rom_bank(), addr as usize)
        } else {
            self.rom_at(self.high_rom_bank(), addr as usize - 0x4000)
        }
    }

    fn write_control(&mut self, addr: u16, val: u8) {
        match &mut self.mapper {
            Mapper::NoMbc => {}
            Mapper::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ram_enable,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    *rom_bank = val & 0x1F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                }
                0x4000..=0x5FFF => *ram_bank = val & 0x03,
                _ => *mode = val & 0x01,
            },
            Mapper::Mbc2 {
                rom_bank,
                ram_enable,
            } => {
                if addr <= 0x3FFF {
                    // Address bit 8 selects between RAM enable and bank
                    // select across the whole range.
                    if addr & 0x0100 == 0 {
                        *ram_enable = val & 0x0F == 0x0A;
                    } else {
                        *rom_bank = (val & 0x0F).max(1);
                    }
                }
            }
            Mapper::Mbc3 {
                rom_bank,
                ram_bank,
                ram_enable,
                latch_pending,
                rtc,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x3FFF => {
                    *rom_bank = val & 0x7F;
                    if *rom_bank == 0 {
                        *rom_bank = 1;
                    }
                }
                0x4000..=0x5FFF => *ram_bank = val,
                _ => {
                    // Writing 0 then 1 latches the live clock into the
                    // latched registers.
                    if val == 0 {
                        *latch_pending = true;
                    } else {
                        if val == 1 && *latch_pending {
                            if let Some(rtc) = rtc {
                                rtc.latch();
                            }
                        }
                        *latch_pending = false;
                    }
                }
            },
            Mapper::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
            } => match addr {
                0x0000..=0x1FFF => *ram_enable = val & 0x0F == 0x0A,
                0x2000..=0x2FFF => *rom_bank = (*rom_bank & 0x100) | val as u16,
                0x3000..=0x3FFF => *rom_bank = (*rom_bank & 0x0FF) | (((val & 0x01) as u16) << 8),
                0x4000..=0x5FFF => *ram_bank = val & 0x0F,
                _ => {}
            },
        }
    }

    fn ram_index(&self, addr: u16) -> usize {
        let offset = addr as usize - 0xA000;
        match &self.mapper {
            Mapper::NoMbc => offset,
            Mapper::Mbc1 { ram_bank, mode, .. } => {
                if *mode == 0 {
                    offset
                } else {
                    ((*ram_bank as usize) & 0x03) * RAM_BANK_SIZE + offset
                }
            }
            Mapper::Mbc2 { .. } => offset & 0x01FF,
            Mapper::Mbc3 { ram_bank, .. } => {
                ((*ram_bank as usize) & 0x03) * RAM_BANK_SIZE + offset
            }
            Mapper::Mbc5 { ram_bank, .. } => {
                ((*ram_bank as usize) & 0x0F) * RAM_BANK_SIZE + offset
            }
        }
    }

    fn ram_enabled(&self) -> bool {
        match &self.mapper {
            Mapper::NoMbc => true,
            Mapper::Mbc1 { ram_enable, .. }
            | Mapper::Mbc2 { ram_enable, .. }
            | Mapper::Mbc3 { ram_enable, .. }
            | Mapper::Mbc5 { ram_enable, .. } => *ram_enable,
        }
    }

    fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled() {
            return 0xFF;
        }
        match &self.mapper {
            Mapper::Mbc2 { .. } => {
                // 512 half-byte cells, mirrored; the upper nibble is open bus
                // and reads back high.
                let nibble = self
                    .ram
                    .get((addr as usize - 0xA000) & 0x01FF)
                    .copied()
                    .unwrap_or(0x0F);
                0xF0 | (nibble & 0x0F)
            }
            Mapper::Mbc3 { ram_bank, rtc, .. } => match *ram_bank {
                0x00..=0x03 => self.ram.get(self.ram_index(addr)).copied().unwrap_or(0xFF),
                0x08..=0x0C => rtc
                    .as_ref()
                    .map(|r| r.read_latched(*ram_bank))
                    .unwrap_or(0xFF),
                _ => 0xFF,
            },
            _ => self.ram.get(self.ram_index(addr)).copied().unwrap_or(0xFF),
        }
    }

    fn write_ram(&mut self, addr: u16, val: u8) {
        if !self.ram_enabled() {
            return;
        }
        match &mut self.mapper {
            Mapper::Mbc2 { .. } => {
                let idx = (addr as usize - 0xA000) & 0x01FF;
                if let Some(cell) = self.ram.get_mut(idx) {
                    *cell = val & 0x0F;
                }
            }
            Mapper::Mbc3 { ram_bank, rtc, .. } => {
                let bank = *ram_bank;
                match bank {
                    0x00..=0x03 => {
                        let idx = ((bank as usize) & 0x03) * RAM_BANK_SIZE + addr as usize - 0xA000;
                        if let Some(cell) = self.ram.get_mut(idx) {
                            *cell = val;
                        }
                    }
                    0x08..=0x0C => {
                        if let Some(rtc) = rtc.as_mut() {
                            rtc.write_register(bank, val);
                        }
                    }
                    _ => {}
                }
            }
            _ => {
                let idx = self.ram_index(addr);
                if let Some(cell) = self.ram.get_mut(idx) {
                    *cell = val;
                }
            }
        }
    }

    pub fn save_state(&self, out: &mut Vec<u8>) {
        out.push(self.kind.tag());
        match &self.mapper {
            Mapper::NoMbc => {}
            Mapper::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ram_enable,
            } => {
                out.push(*rom_bank);
                out.push(*ram_bank);
                out.push(*mode);
                out.push(*ram_enable as u8);
            }
            Mapper::Mbc2 {
                rom_bank,
                ram_enable,
            } => {
                out.push(*rom_bank);
                out.push(*ram_enable as u8);
            }
            Mapper::Mbc3 {
                rom_bank,
                ram_bank,
                ram_enable,
                latch_pending,
                rtc,
            } => {
                out.push(*rom_bank);
                out.push(*ram_bank);
                out.push(*ram_enable as u8);
                out.push(*latch_pending as u8);
                match rtc {
                    Some(rtc) => {
                        out.push(1);
                        rtc.save_state(out);
                    }
                    None => {
                        out.push(0);
                        out.extend_from_slice(&[0; Rtc::STATE_LEN]);
                    }
                }
            }
            Mapper::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
            } => {
                out.extend_from_slice(&rom_bank.to_le_bytes());
                out.push(*ram_bank);
                out.push(*ram_enable as u8);
            }
        }
        out.extend_from_slice(&(self.ram.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.ram);
    }

    /// Number of mapper-state bytes that follow the tag byte for this kind
    /// (external RAM length/body not included).
    pub fn mapper_state_len(kind: MbcKind) -> usize {
        match kind {
            MbcKind::NoMbc => 0,
            MbcKind::Mbc1 => 4,
            MbcKind::Mbc2 => 2,
            MbcKind::Mbc3 => 4 + 1 + Rtc::STATE_LEN,
            MbcKind::Mbc5 => 4,
        }
    }

    /// Restore mapper registers and RAM from `save_state` bytes. The caller
    /// has already validated the tag and RAM length against this cartridge.
    pub fn load_state(&mut self, data: &[u8]) {
        let mut cur = 0usize;
        match &mut self.mapper {
            Mapper::NoMbc => {}
            Mapper::Mbc1 {
                rom_bank,
                ram_bank,
                mode,
                ram_enable,
            } => {
                *rom_bank = data[0];
                *ram_bank = data[1];
                *mode = data[2];
                *ram_enable = data[3] != 0;
                cur = 4;
            }
            Mapper::Mbc2 {
                rom_bank,
                ram_enable,
            } => {
                *rom_bank = data[0];
                *ram_enable = data[1] != 0;
                cur = 2;
            }
            Mapper::Mbc3 {
                rom_bank,
                ram_bank,
                ram_enable,
                latch_pending,
                rtc,
            } => {
                *rom_bank = data[0];
                *ram_bank = data[1];
                *ram_enable = data[2] != 0;
                *latch_pending = data[3] != 0;
                let present = data[4] != 0;
                if present {
                    let rtc = rtc.get_or_insert_with(Rtc::default);
                    rtc.load_state(&data[5..5 + Rtc::STATE_LEN]);
                } else {
                    *rtc = None;
                }
                cur = 5 + Rtc::STATE_LEN;
            }
            Mapper::Mbc5 {
                rom_bank,
                ram_bank,
                ram_enable,
            } => {
                *rom_bank = u16::from_le_bytes([data[0], data[1]]);
                *ram_bank = data[2];
                *ram_enable = data[3] != 0;
                cur = 4;
            }
        }
        let ram_len = u32::from_le_bytes([data[cur], data[cur + 1], data[cur + 2], data[cur + 3]])
            as usize;
        cur += 4;
        self.ram.copy_from_slice(&data[cur..cur + ram_len]);
    }
}

pub struct Header<'a> {
    data: &'a [u8],
}

impl<'a> Header<'a> {
    pub fn parse(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn title(&self) -> String {
        let end = 0x0143.min(self.data.len());
        let start = 0x0134.min(self.data.len());
        let mut slice = &self.data[start..end];
        if let Some(pos) = slice.iter().position(|&b| b == 0) {
            slice = &slice[..pos];
        }
        String::from_utf8_lossy(slice).trim().to_string()
    }

    pub fn cgb_supported(&self) -> bool {
        self.data.get(0x0143).copied().unwrap_or(0) & 0x80 != 0
    }

    pub fn cart_type(&self) -> u8 {
        self.data.get(0x0147).copied().unwrap_or(0)
    }

    pub fn rom_version(&self) -> u8 {
        self.data.get(0x014C).copied().unwrap_or(0)
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.cart_type(), 0x0F | 0x10 | 0x13)
    }

    pub fn mbc_kind(&self) -> MbcKind {
        match self.cart_type() {
            0x00 | 0x08 | 0x09 => MbcKind::NoMbc,
            0x01..=0x03 => MbcKind::Mbc1,
            0x05 | 0x06 => MbcKind::Mbc2,
            0x0F..=0x13 => MbcKind::Mbc3,
            0x19..=0x1E => MbcKind::Mbc5,
            _ => MbcKind::NoMbc,
        }
    }

    pub fn ram_size(&self) -> usize {
        // MBC2 carries its 512x4-bit RAM on-die regardless of the RAM code.
        if matches!(self.cart_type(), 0x05 | 0x06) {
            return 0x200;
        }
        match self.data.get(0x0149).copied().unwrap_or(0) {
            0x00 => 0,
            0x01 => 0x800,
            0x02 => 0x2000,
            0x03 => 0x8000,
            0x04 => 0x20000,
            0x05 => 0x10000,
            _ => 0x2000,
        }
    }

    /// ROM size implied by the header size code, in bytes.
    pub fn rom_size(&self) -> usize {
        let code = self.data.get(0x0148).copied().unwrap_or(0);
        match code {
            0x00..=0x08 => 0x8000 << code,
            _ => 0x8000,
        }
    }

    /// Header checksum over 0x0134-0x014C as computed by the boot ROM.
    pub fn compute_checksum(&self) -> u8 {
        let mut x = 0u8;
        for addr in 0x0134..=0x014C {
            let byte = self.data.get(addr).copied().unwrap_or(0);
            x = x.wrapping_sub(byte).wrapping_sub(1);
        }
        x
    }

    pub fn stored_checksum(&self) -> u8 {
        self.data.get(0x014D).copied().unwrap_or(0)
    }

    /// All header problems with this image. Empty for a well-formed ROM.
    pub fn validate(&self) -> Vec<CartridgeError> {
        let mut problems = Vec::new();
        if self.data.len() < 0x150 {
            problems.push(CartridgeError::Truncated(self.data.len()));
            return problems;
        }
        let cart_type = self.cart_type();
        let known = matches!(
            cart_type,
            0x00..=0x03 | 0x05 | 0x06 | 0x08 | 0x09 | 0x0F..=0x13 | 0x19..=0x1E
        );
        if !known {
            problems.push(CartridgeError::UnsupportedMapper(cart_type));
        }
        let computed = self.compute_checksum();
        let stored = self.stored_checksum();
        if computed != stored {
            problems.push(CartridgeError::HeaderChecksum { computed, stored });
        }
        if self.data.len() < self.rom_size() {
            problems.push(CartridgeError::SizeMismatch {
                code: self.data.get(0x0148).copied().unwrap_or(0),
            });
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_with_type(cart_type: u8, banks: usize) -> Vec<u8> {
        let mut rom = vec![0u8; banks * ROM_BANK_SIZE];
        rom[0x0147] = cart_type;
        for (bank, chunk) in rom.chunks_mut(ROM_BANK_SIZE).enumerate() {
            chunk[0] = bank as u8;
        }
        rom[0x0147] = cart_type;
        rom
    }

    fn fix_checksum(rom: &mut [u8]) {
        let mut x = 0u8;
        for addr in 0x0134..=0x014C {
            x = x.wrapping_sub(rom[addr]).wrapping_sub(1);
        }
        rom[0x014D] = x;
    }

    #[test]
    fn header_checksum_detects_corruption() {
        let mut rom = rom_with_type(0x00, 2);
        fix_checksum(&mut rom);
        assert!(Header::parse(&rom).validate().is_empty());

        rom[0x0134] ^= 0xFF;
        let problems = Header::parse(&rom).validate();
        assert!(problems
            .iter()
            .any(|p| matches!(p, CartridgeError::HeaderChecksum { .. })));
    }

    #[test]
    fn unknown_mapper_degrades_to_nombc() {
        let mut rom = rom_with_type(0xFC, 2);
        fix_checksum(&mut rom);
        let cart = Cartridge::load(rom);
        assert_eq!(cart.kind, MbcKind::NoMbc);
        assert!(cart
            .degradations()
            .iter()
            .any(|p| matches!(p, CartridgeError::UnsupportedMapper(0xFC))));
    }

    #[test]
    fn mbc1_bank_zero_remaps_to_one() {
        let rom = rom_with_type(0x01, 4);
        let mut cart = Cartridge::load(rom);
        cart.write(0x2000, 0x00);
        assert_eq!(cart.read(0x4000), 1);
        cart.write(0x2000, 0x02);
        assert_eq!(cart.read(0x4000), 2);
    }

    #[test]
    fn mbc1_mode_one_remaps_low_window() {
        let rom = rom_with_type(0x01, 64);
        let mut cart = Cartridge::load(rom);
        cart.write(0x4000, 0x01); // upper bank bits
        assert_eq!(cart.read(0x0000), 0, "mode 0 keeps bank 0 fixed");
        cart.write(0x6000, 0x01);
        assert_eq!(cart.read(0x0000), 32);
    }

    #[test]
    fn mbc2_ram_is_nibbles() {
        let rom = rom_with_type(0x05, 2);
        let mut cart = Cartridge::load(rom);
        cart.write(0x0000, 0x0A); // addr bit 8 clear: RAM enable
        cart.write(0xA000, 0xA5);
        assert_eq!(cart.read(0xA000), 0xF5);
        // mirrored every 512 bytes
        assert_eq!(cart.read(0xA200), 0xF5);
    }

    #[test]
    fn mbc2_bank_select_needs_address_bit_8() {
        let rom = rom_with_type(0x05, 8);
        let mut cart = Cartridge::load(rom);
        cart.write(0x0100, 0x03);
        assert_eq!(cart.read(0x4000), 3);
        // bit 8 clear: this is a RAM-enable write, bank unchanged
        cart.write(0x0000, 0x05);
        assert_eq!(cart.read(0x4000), 3);
    }

    #[test]
    fn mbc3_rtc_latch_and_day_carry() {
        let mut rom = rom_with_type(0x0F, 2);
        fix_checksum(&mut rom);
        let mut cart = Cartridge::load(rom);
        cart.write(0x0000, 0x0A);
        // Point the RAM window at the seconds register.
        cart.write(0x4000, 0x08);
        assert_eq!(cart.read(0xA000), 0x00);

        // One emulated second; latched value is stale until a 0->1 latch.
        for _ in 0..(RTC_CYCLES_PER_SECOND / 0x8000) {
            cart.step_rtc(0x8000);
        }
        assert_eq!(cart.read(0xA000), 0x00);
        cart.write(0x6000, 0x00);
        cart.write(0x6000, 0x01);
        assert_eq!(cart.read(0xA000), 0x01);

        // Day counter overflow sets the carry bit.
        cart.write(0x4000, 0x0C);
        cart.write(0xA000, 0x01); // day bit 8
        cart.write(0x4000, 0x0B);
        cart.write(0xA000, 0xFF); // day low byte
        if let Mapper::Mbc3 { rtc: Some(rtc), .. } = &mut cart.mapper {
            rtc.seconds = 59;
            rtc.minutes = 59;
            rtc.hours = 23;
            rtc.second_tick();
            assert_eq!(rtc.days, 0);
            assert!(rtc.carry);
        } else {
            panic!("expected MBC3 with RTC");
        }
    }

    #[test]
    fn mbc5_bank_zero_is_selectable() {
        let rom = rom_with_type(0x19, 4);
        let mut cart = Cartridge::load(rom);
        cart.write(0x2000, 0x00);
        assert_eq!(cart.read(0x4000), 0);
        cart.write(0x2000, 0x03);
        assert_eq!(cart.read(0x4000), 3);
    }

    #[test]
    fn mbc1_ram_banking_in_mode_one() {
        let mut rom = rom_with_type(0x03, 2);
        rom[0x0149] = 0x03; // 32KB: four banks
        let mut cart = Cartridge::from_bytes_with_ram(rom, 0x8000);
        cart.write(0x0000, 0x0A);

        cart.write(0x6000, 0x01); // banked mode
        cart.write(0x4000, 0x00);
        cart.write(0xA000, 0x11);
        cart.write(0x4000, 0x02);
        cart.write(0xA000, 0x22);

        cart.write(0x4000, 0x00);
        assert_eq!(cart.read(0xA000), 0x11);
        cart.write(0x4000, 0x02);
        assert_eq!(cart.read(0xA000), 0x22);

        // Mode 0 pins the window to bank 0.
        cart.write(0x6000, 0x00);
        assert_eq!(cart.read(0xA000), 0x11);
    }

    #[test]
    fn mbc3_ram_bank_window_moves() {
        let mut rom = rom_with_type(0x10, 2); // MBC3+RTC+RAM+BATTERY
        rom[0x0149] = 0x03;
        let mut cart = Cartridge::from_bytes_with_ram(rom, 0x8000);
        cart.write(0x0000, 0x0A);
        cart.write(0x4000, 0x00);
        cart.write(0xA123, 0xAA);
        cart.write(0x4000, 0x03);
        cart.write(0xA123, 0xBB);
        cart.write(0x4000, 0x00);
        assert_eq!(cart.read(0xA123), 0xAA);
        cart.write(0x4000, 0x03);
        assert_eq!(cart.read(0xA123), 0xBB);
    }

    #[test]
    fn mbc3_rom_bank_zero_maps_to_one() {
        let mut cart = Cartridge::load(rom_with_type(0x11, 8));
        cart.write(0x2000, 0x00);
        assert_eq!(cart.read(0x4000), 1);
        cart.write(0x2000, 0x05);
        assert_eq!(cart.read(0x4000), 5);
    }

    #[test]
    fn rom_reads_wrap_to_available_banks() {
        // A 4-bank image with a bank register beyond the ROM size.
        let mut cart = Cartridge::load(rom_with_type(0x01, 4));
        cart.write(0x2000, 0x13); // bank 19 on a 4-bank cart
        assert_eq!(cart.read(0x4000), 19 % 4);
    }

    #[test]
    fn disabled_ram_reads_open_bus() {
        let mut rom = rom_with_type(0x03, 2);
        rom[0x0149] = 0x02;
        let mut cart = Cartridge::from_bytes_with_ram(rom, 0x2000);
        assert_eq!(cart.read(0xA000), 0xFF);
        cart.write(0xA000, 0x55); // dropped
        cart.write(0x0000, 0x0A);
        assert_eq!(cart.read(0xA000), 0x00);
    }

    #[test]
    fn battery_ram_round_trips_through_buffers() {
        let mut rom = rom_with_type(0x03, 2); // MBC1+RAM+BATTERY
        rom[0x0149] = 0x02;
        let mut cart = Cartridge::load(rom);
        cart.write(0x0000, 0x0A);
        cart.write(0xA000, 0x42);
        let saved = cart.battery_ram().expect("battery").to_vec();

        let mut rom2 = rom_with_type(0x03, 2);
        rom2[0x0149] = 0x02;
        let mut other = Cartridge::load(rom2);
        other.load_battery_ram(&saved);
        other.write(0x0000, 0x0A);
        assert_eq!(other.read(0xA000), 0x42);
    }
}
