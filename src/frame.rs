//! LIN frame codec: protected identifiers and frame checksums.
//!
//! Pure functions with no I/O, validated against the LIN 2.0 specification
//! ("2.3.1.3 Protected identifier field" and "2.3.1.5 Checksum").
//!
//! Wire format of a complete frame:
//!
//! ```plain
//! |<- 1 byte ->|<- 1 byte ->|<- 1 byte ->|<- 0..8 bytes ->|<- 1 byte ->|
//! +------------+------------+------------+----------------+------------+
//! |   BREAK    |    SYNC    |  PROT. ID  |      DATA      |  CHECKSUM  |
//! +------------+------------+------------+----------------+------------+
//! ```
//!
//! The break is a 0x00 byte written at half the configured baud rate, which
//! doubles its bit duration and reads on the bus as a dominant-long break.

/// Sync field following the break; slaves derive bit timing from it.
pub const SYNC: u8 = 0x55;

/// Break byte, transmitted at half the configured baud rate.
pub const BREAK: u8 = 0x00;

/// Maximum number of data bytes in a frame.
pub const MAX_DATA_LEN: usize = 8;

/// Maximum wire length: break + sync + protected ID + data + checksum.
pub const MAX_FRAME_LEN: usize = 12;

/// Largest logical frame identifier (6 bits).
pub const MAX_ID: u8 = 0x3F;

/// Protected ID of the master-request diagnostic frame (ID 0x3C).
pub const PID_DIAG_REQUEST: u8 = 0x3C;

/// Protected ID of the slave-response diagnostic frame (ID 0x3D).
pub const PID_DIAG_RESPONSE: u8 = 0x7D;

/// LIN protocol version, selecting the checksum algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProtocolVersion {
    /// LIN 1.x: classic checksum over the data bytes only.
    V1,
    /// LIN 2.x: enhanced checksum including the protected ID.
    #[default]
    V2,
}

/// Direction of the data portion of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Master supplies header and data; the full frame echo is verified.
    MasterRequest,
    /// Master supplies only the header; a slave supplies data and checksum.
    SlaveResponse,
}

/// Compute the protected LIN identifier from a 6-bit frame ID.
///
/// The input is masked to 6 bits first, so passing an already-protected ID
/// recomputes the same parity bits: the function is idempotent with respect
/// to the low 6 bits.
pub fn protect_id(id: u8) -> u8 {
    let mut pid = id & MAX_ID;
    // pid[6] = P0 = ID0 ^ ID1 ^ ID2 ^ ID4
    let p0 = (pid ^ (pid >> 1) ^ (pid >> 2) ^ (pid >> 4)) & 0x01;
    pid |= p0 << 6;
    // pid[7] = P1 = !(ID1 ^ ID3 ^ ID4 ^ ID5)
    let p1 = !((pid >> 1) ^ (pid >> 3) ^ (pid >> 4) ^ (pid >> 5)) & 0x01;
    pid |= p1 << 7;
    pid
}

/// Compute the frame checksum over the (protected) ID and data bytes.
///
/// LIN 2.x seeds the sum with the protected ID; LIN 1.x sums data bytes
/// only. Diagnostic frames (PID 0x3C / 0x7D) always use the classic data-only
/// sum regardless of the configured version, per the LIN spec. The sum uses
/// end-around carry and the result is the one's complement of the low byte.
///
/// `id` may be raw or already protected; it is re-protected internally.
pub fn checksum(version: ProtocolVersion, id: u8, data: &[u8]) -> u8 {
    let pid = protect_id(id);

    let mut sum: u16 = 0;
    if version == ProtocolVersion::V2 && pid != PID_DIAG_REQUEST && pid != PID_DIAG_RESPONSE {
        sum = pid as u16;
    }

    for &byte in data {
        sum += byte as u16;
        if sum > 255 {
            sum -= 255;
        }
    }

    !(sum as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn protect_id_known_vectors() {
        // Parity table values from the LIN 2.0 specification.
        assert_eq!(protect_id(0x00), 0x80);
        assert_eq!(protect_id(0x01), 0xC1);
        assert_eq!(protect_id(0x02), 0x42);
        assert_eq!(protect_id(0x03), 0x03);
        assert_eq!(protect_id(0x10), 0x50);
        assert_eq!(protect_id(0x3C), 0x3C);
        assert_eq!(protect_id(0x3D), 0x7D);
    }

    #[test]
    fn protect_id_parity_equations_all_ids() {
        for id in 0u8..=MAX_ID {
            let pid = protect_id(id);
            assert_eq!(pid & MAX_ID, id, "ID bits must pass through unchanged");

            let bit = |n: u8| (id >> n) & 1;
            let p0 = bit(0) ^ bit(1) ^ bit(2) ^ bit(4);
            let p1 = !(bit(1) ^ bit(3) ^ bit(4) ^ bit(5)) & 1;
            assert_eq!((pid >> 6) & 1, p0, "P0 mismatch for ID 0x{id:02X}");
            assert_eq!((pid >> 7) & 1, p1, "P1 mismatch for ID 0x{id:02X}");
        }
    }

    #[test]
    fn protect_id_idempotent() {
        for id in 0u8..=MAX_ID {
            let pid = protect_id(id);
            assert_eq!(protect_id(pid), pid);
        }
    }

    #[test]
    fn checksum_classic_for_v1() {
        // Data-only sum, ID must not contribute.
        assert_eq!(checksum(ProtocolVersion::V1, 0x10, &[0x01, 0x02]), !0x03u8);
        assert_eq!(
            checksum(ProtocolVersion::V1, 0x10, &[]),
            checksum(ProtocolVersion::V1, 0x23, &[])
        );
    }

    #[test]
    fn checksum_enhanced_for_v2() {
        // PID 0x50 + 0x01 + 0x02 = 0x53, inverted.
        assert_eq!(checksum(ProtocolVersion::V2, 0x10, &[0x01, 0x02]), 0xAC);
    }

    #[test]
    fn checksum_end_around_carry() {
        // 0x80 (PID of ID 0) + 0xFF wraps: 0x17F - 0xFF = 0x80.
        assert_eq!(checksum(ProtocolVersion::V2, 0x00, &[0xFF]), !0x80u8);
    }

    #[test]
    fn checksum_diagnostic_ids_always_classic() {
        for id in [0x3C, 0x3D] {
            assert_eq!(
                checksum(ProtocolVersion::V2, id, &[0x11, 0x22]),
                checksum(ProtocolVersion::V1, id, &[0x11, 0x22]),
                "diagnostic ID 0x{id:02X} must use the classic checksum"
            );
        }
    }

    proptest! {
        #[test]
        fn checksum_accepts_raw_or_protected_id(
            id in 0u8..=MAX_ID,
            data in proptest::collection::vec(any::<u8>(), 0..=MAX_DATA_LEN),
        ) {
            // Sender computes over the raw ID, receiver over the protected
            // ID read off the wire; both must agree.
            prop_assert_eq!(
                checksum(ProtocolVersion::V2, id, &data),
                checksum(ProtocolVersion::V2, protect_id(id), &data)
            );
        }

        #[test]
        fn checksum_detects_single_byte_corruption(
            id in 0u8..=MAX_ID,
            data in proptest::collection::vec(any::<u8>(), 1..=MAX_DATA_LEN),
            idx in any::<prop::sample::Index>(),
            flip in 1u8..,
        ) {
            let i = idx.index(data.len());
            let mut corrupted = data.clone();
            corrupted[i] ^= flip;

            // 0x00 and 0xFF are congruent under the mod-255 sum; that single
            // substitution is invisible to the checksum by construction, so
            // exclude it from the detection claim.
            let pair = (data[i], corrupted[i]);
            prop_assume!(pair != (0x00, 0xFF) && pair != (0xFF, 0x00));

            prop_assert_ne!(
                checksum(ProtocolVersion::V2, id, &data),
                checksum(ProtocolVersion::V2, id, &corrupted)
            );
        }

        #[test]
        fn checksum_detects_pid_corruption(
            id in 0u8..=MAX_ID,
            other in 0u8..=MAX_ID,
            data in proptest::collection::vec(any::<u8>(), 0..=MAX_DATA_LEN),
        ) {
            prop_assume!(id != other);
            let pid_a = protect_id(id);
            let pid_b = protect_id(other);
            // Same congruence caveat as for data bytes.
            prop_assume!((pid_a as i16 - pid_b as i16).rem_euclid(255) != 0);
            // Diagnostic PIDs drop out of the sum entirely.
            prop_assume!(pid_a != PID_DIAG_REQUEST && pid_a != PID_DIAG_RESPONSE);
            prop_assume!(pid_b != PID_DIAG_REQUEST && pid_b != PID_DIAG_RESPONSE);

            prop_assert_ne!(
                checksum(ProtocolVersion::V2, id, &data),
                checksum(ProtocolVersion::V2, other, &data)
            );
        }
    }
}
