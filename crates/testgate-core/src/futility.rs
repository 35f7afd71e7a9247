//! Adapter for the Chromium OS `futility` firmware utility
//!
//! Only the commands used for GBB creation and firmware signing are covered.
//! Every call returns the tool's stdout and fails on a non-zero exit.

use crate::command::{CommandRunner, ExternalCommand, SystemRunner};
use crate::error::GateResult;
use std::path::{Path, PathBuf};

/// Region sizes of a Google Binary Block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GbbSizes {
    pub hwid: u32,
    pub rootkey: u32,
    pub bmpfv: u32,
    pub recoverykey: u32,
}

/// Parameters written into a Google Binary Block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GbbSettings {
    pub hwid: String,
    pub rootkey: PathBuf,
    pub recoverykey: PathBuf,
    pub flags: u32,
    pub bmpfv: PathBuf,
}

/// Inputs for signing a firmware image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareSigning {
    pub vblock: PathBuf,
    pub keyblock: PathBuf,
    pub signprivate: PathBuf,
    pub version: u32,
    pub firmware: PathBuf,
    pub kernelkey: PathBuf,
    pub flags: u32,
}

/// Inputs for packing a kernel partition
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelPack {
    pub kpart: PathBuf,
    pub keyblock: PathBuf,
    pub signprivate: PathBuf,
    pub version: u32,
    pub vmlinuz: PathBuf,
    pub bootloader: PathBuf,
    pub config: PathBuf,
    pub arch: String,
    pub kloadaddr: Option<u64>,
    pub pad: Option<u64>,
    pub vblockonly: bool,
    pub flags: Option<u32>,
}

/// Runs `futility` subcommands
pub struct Futility<R = SystemRunner> {
    program: String,
    runner: R,
}

impl Futility<SystemRunner> {
    /// Use `futility` from PATH
    pub fn new() -> Self {
        Self::with_runner(SystemRunner)
    }
}

impl Default for Futility<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Futility<R> {
    pub fn with_runner(runner: R) -> Self {
        Self {
            program: "futility".to_string(),
            runner,
        }
    }

    /// Use a specific futility binary
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Create an empty GBB with the given region sizes
    pub fn gbb_create(&self, fname: &Path, sizes: GbbSizes) -> GateResult<String> {
        let sizes = [sizes.hwid, sizes.rootkey, sizes.bmpfv, sizes.recoverykey]
            .iter()
            .map(|size| format!("{:#x}", size))
            .collect::<Vec<_>>()
            .join(",");
        self.run(["gbb_utility".to_string(), "-c".to_string(), sizes, path_arg(fname)])
    }

    /// Set the parameters of an existing GBB
    pub fn gbb_set(&self, fname: &Path, settings: &GbbSettings) -> GateResult<String> {
        self.run([
            "gbb_utility".to_string(),
            "-s".to_string(),
            format!("--hwid={}", settings.hwid),
            format!("--rootkey={}", settings.rootkey.display()),
            format!("--recoverykey={}", settings.recoverykey.display()),
            format!("--flags={}", settings.flags),
            format!("--bmpfv={}", settings.bmpfv.display()),
            path_arg(fname),
        ])
    }

    /// Sign a firmware image, writing the verification block
    pub fn sign_firmware(&self, signing: &FirmwareSigning) -> GateResult<String> {
        self.run([
            "vbutil_firmware".to_string(),
            "--vblock".to_string(),
            path_arg(&signing.vblock),
            "--keyblock".to_string(),
            path_arg(&signing.keyblock),
            "--signprivate".to_string(),
            path_arg(&signing.signprivate),
            "--version".to_string(),
            signing.version.to_string(),
            "--fv".to_string(),
            path_arg(&signing.firmware),
            "--kernelkey".to_string(),
            path_arg(&signing.kernelkey),
            "--flags".to_string(),
            signing.flags.to_string(),
        ])
    }

    /// Pack a kernel partition; optional settings follow in a fixed order
    pub fn pack_kernel(&self, pack: &KernelPack) -> GateResult<String> {
        let mut args = vec![
            "vbutil_kernel".to_string(),
            "--pack".to_string(),
            path_arg(&pack.kpart),
            "--keyblock".to_string(),
            path_arg(&pack.keyblock),
            "--signprivate".to_string(),
            path_arg(&pack.signprivate),
            "--version".to_string(),
            pack.version.to_string(),
            "--vmlinuz".to_string(),
            path_arg(&pack.vmlinuz),
            "--bootloader".to_string(),
            path_arg(&pack.bootloader),
            "--config".to_string(),
            path_arg(&pack.config),
            "--arch".to_string(),
            pack.arch.clone(),
        ];
        if let Some(kloadaddr) = pack.kloadaddr {
            args.extend(["--kloadaddr".to_string(), kloadaddr.to_string()]);
        }
        if let Some(pad) = pack.pad {
            args.extend(["--pad".to_string(), pad.to_string()]);
        }
        if pack.vblockonly {
            args.push("--vblockonly".to_string());
        }
        if let Some(flags) = pack.flags {
            args.extend(["--flags".to_string(), flags.to_string()]);
        }
        self.run(args)
    }

    /// First line of `futility version`
    pub fn version(&self) -> GateResult<String> {
        let output = self.run(["version".to_string()])?;
        Ok(output.lines().next().unwrap_or_default().trim().to_string())
    }

    fn run(&self, args: impl IntoIterator<Item = String>) -> GateResult<String> {
        let command = ExternalCommand::new(self.program.as_str()).args(args);
        self.runner.output(&command)
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}
