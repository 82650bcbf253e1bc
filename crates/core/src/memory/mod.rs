// ThumbSim - Thumb Instruction Core Simulator
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

/// A fixed-size byte array mapped at an inclusive `[begin, end]` range.
///
/// Multi-byte accesses are little-endian. Bytes of an access that fall past
/// `end` read as zero and are dropped on write, so an access straddling the
/// region end is truncated rather than spilling into a neighbour.
#[derive(Clone)]
pub struct MemoryRegion {
    pub name: &'static str,
    data: Vec<u8>,
    begin: u32,
}

impl MemoryRegion {
    /// `size` must be non-zero and `begin + size` must not exceed 4 GiB.
    pub fn new(name: &'static str, begin: u32, size: u32) -> Self {
        Self {
            name,
            data: vec![0; size as usize],
            begin,
        }
    }

    pub fn begin(&self) -> u32 {
        self.begin
    }

    /// Last addressable byte (inclusive).
    pub fn end(&self) -> u32 {
        self.begin
            .wrapping_add(self.data.len() as u32)
            .wrapping_sub(1)
    }

    pub fn size(&self) -> u32 {
        self.data.len() as u32
    }

    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.begin && ((addr - self.begin) as usize) < self.data.len()
    }

    fn offset(&self, addr: u32) -> usize {
        (addr - self.begin) as usize
    }

    /// Little-endian read of `width` bytes starting at `addr`, which must be
    /// inside the region.
    pub fn read(&self, addr: u32, width: usize) -> u32 {
        let start = self.offset(addr);
        (0..width).fold(0u32, |acc, i| {
            let byte = self.data.get(start + i).copied().unwrap_or(0);
            acc | ((byte as u32) << (8 * i))
        })
    }

    pub fn write(&mut self, addr: u32, width: usize, value: u32) {
        let start = self.offset(addr);
        for i in 0..width {
            if let Some(byte) = self.data.get_mut(start + i) {
                *byte = (value >> (8 * i)) as u8;
            }
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("name", &self.name)
            .field("begin", &format_args!("{:#010x}", self.begin))
            .field("end", &format_args!("{:#010x}", self.end()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inclusive_bounds() {
        let mem = MemoryRegion::new("code", 0x100, 0x100);
        assert_eq!(mem.begin(), 0x100);
        assert_eq!(mem.end(), 0x1FF);
        assert!(mem.contains(0x100));
        assert!(mem.contains(0x1FF));
        assert!(!mem.contains(0xFF));
        assert!(!mem.contains(0x200));
    }

    #[test]
    fn test_little_endian_access() {
        let mut mem = MemoryRegion::new("sram", 0x2000_0000, 16);
        mem.write(0x2000_0000, 4, 0x1234_5678);
        assert_eq!(mem.as_slice()[..4], [0x78, 0x56, 0x34, 0x12]);
        assert_eq!(mem.read(0x2000_0000, 2), 0x5678);
        assert_eq!(mem.read(0x2000_0002, 1), 0x34);
    }

    #[test]
    fn test_access_truncated_at_region_end() {
        let mut mem = MemoryRegion::new("sram", 0x0, 8);
        mem.write(0x6, 4, 0xAABB_CCDD);
        assert_eq!(mem.as_slice()[6..], [0xDD, 0xCC]);
        // High half lies outside the region and reads as zero
        assert_eq!(mem.read(0x6, 4), 0x0000_CCDD);
    }

    #[test]
    fn test_region_ending_at_top_of_address_space() {
        let mem = MemoryRegion::new("top", 0xFFFF_FF00, 0x100);
        assert_eq!(mem.end(), 0xFFFF_FFFF);
        assert!(mem.contains(0xFFFF_FFFF));
    }
}
