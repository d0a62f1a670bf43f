//! SMPP command status codes.

use std::fmt;

/// A `command_status` value. Unknown codes are carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(pub u32);

impl Status {
    pub const OK: Status = Status(0x0000_0000);
    pub const INVMSGLEN: Status = Status(0x0000_0001);
    pub const INVCMDLEN: Status = Status(0x0000_0002);
    pub const INVCMDID: Status = Status(0x0000_0003);
    pub const INVBNDSTS: Status = Status(0x0000_0004);
    pub const ALYBND: Status = Status(0x0000_0005);
    pub const INVPRTFLG: Status = Status(0x0000_0006);
    pub const INVREGDLVFLG: Status = Status(0x0000_0007);
    pub const SYSERR: Status = Status(0x0000_0008);
    pub const INVSRCADR: Status = Status(0x0000_000A);
    pub const INVDSTADR: Status = Status(0x0000_000B);
    pub const INVMSGID: Status = Status(0x0000_000C);
    pub const BINDFAIL: Status = Status(0x0000_000D);
    pub const INVPASWD: Status = Status(0x0000_000E);
    pub const INVSYSID: Status = Status(0x0000_000F);
    pub const MSGQFUL: Status = Status(0x0000_0014);
    pub const INVSYSTYP: Status = Status(0x0000_0053);
    pub const THROTTLED: Status = Status(0x0000_0058);
    pub const INVOPTPARSTREAM: Status = Status(0x0000_00C0);
    pub const OPTPARNOTALLWD: Status = Status(0x0000_00C1);
    pub const INVPARLEN: Status = Status(0x0000_00C2);
    pub const MISSINGOPTPARAM: Status = Status(0x0000_00C3);
    pub const UNKNOWNERR: Status = Status(0x0000_00FF);

    pub fn from_u32(code: u32) -> Self {
        Status(code)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self == Self::OK
    }

    /// Symbolic ESME name, or `"ESME_UNKNOWN"` for codes not listed above.
    pub fn name(self) -> &'static str {
        match self.0 {
            0x00 => "ESME_ROK",
            0x01 => "ESME_RINVMSGLEN",
            0x02 => "ESME_RINVCMDLEN",
            0x03 => "ESME_RINVCMDID",
            0x04 => "ESME_RINVBNDSTS",
            0x05 => "ESME_RALYBND",
            0x06 => "ESME_RINVPRTFLG",
            0x07 => "ESME_RINVREGDLVFLG",
            0x08 => "ESME_RSYSERR",
            0x0A => "ESME_RINVSRCADR",
            0x0B => "ESME_RINVDSTADR",
            0x0C => "ESME_RINVMSGID",
            0x0D => "ESME_RBINDFAIL",
            0x0E => "ESME_RINVPASWD",
            0x0F => "ESME_RINVSYSID",
            0x14 => "ESME_RMSGQFUL",
            0x53 => "ESME_RINVSYSTYP",
            0x58 => "ESME_RTHROTTLED",
            0xC0 => "ESME_RINVOPTPARSTREAM",
            0xC1 => "ESME_ROPTPARNOTALLWD",
            0xC2 => "ESME_RINVPARLEN",
            0xC3 => "ESME_RMISSINGOPTPARAM",
            0xFF => "ESME_RUNKNOWNERR",
            _ => "ESME_UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:08X})", self.name(), self.0)
    }
}

impl From<u32> for Status {
    fn from(code: u32) -> Self {
        Status(code)
    }
}
