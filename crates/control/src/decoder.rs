//! Raw command decoding
//!
//! Turns an `(address, args)` pair into a tagged `ControlCommand`.
//! Argument-count overloading is resolved here and nowhere else.

use contracts::{
    ArgValue, ChannelKind, ControlCommand, JointOverride, OverrideMode, PoseValue, RawCommand,
    SynthError,
};
use tracing::debug;

pub const SEQ_INDEX: &str = "/mocap/seqindex";
pub const SEQ_INPUT: &str = "/mocap/seqinput";
pub const SEQ_BLEND: &str = "/mocap/seqblend";
pub const SEQ_INIT: &str = "/mocap/seqinit";
pub const SET_JOINT_POS: &str = "/mocap/setjointpos";
pub const CHANGE_JOINT_POS: &str = "/mocap/changejointpos";
pub const SET_JOINT_ROT: &str = "/mocap/setjointrot";
pub const CHANGE_JOINT_ROT: &str = "/mocap/changejointrot";

/// Decoder bound to one skeleton layout
#[derive(Debug, Clone, Copy)]
pub struct CommandDecoder {
    joint_dim: usize,
    channel: ChannelKind,
}

impl CommandDecoder {
    pub fn new(joint_dim: usize, channel: ChannelKind) -> Self {
        Self { joint_dim, channel }
    }

    /// Trailing arguments that make up one pose value
    pub fn value_width(&self) -> usize {
        self.channel.value_width(self.joint_dim)
    }

    /// Decode one raw command
    ///
    /// Unknown addresses and unexpected argument counts are `MalformedCommand`.
    pub fn decode(&self, raw: &RawCommand) -> Result<ControlCommand, SynthError> {
        let address = raw.address.as_str();
        let args = raw.args.as_slice();
        match address {
            SEQ_INDEX => {
                expect_len(address, args, 1)?;
                Ok(ControlCommand::SelectSequence {
                    index: index_arg(address, &args[0])?,
                })
            }
            SEQ_INPUT => match args {
                [start] => Ok(ControlCommand::SetReferenceWindow {
                    start: index_arg(address, start)?,
                    count: None,
                }),
                [start, count] => Ok(ControlCommand::SetReferenceWindow {
                    start: index_arg(address, start)?,
                    count: Some(index_arg(address, count)?),
                }),
                _ => Err(SynthError::malformed(
                    address,
                    format!("expected 1 or 2 arguments, got {}", args.len()),
                )),
            },
            SEQ_BLEND => {
                expect_len(address, args, 1)?;
                Ok(ControlCommand::SetBlendFactor {
                    factor: number_arg(address, &args[0])?,
                })
            }
            SEQ_INIT => {
                expect_len(address, args, 0)?;
                Ok(ControlCommand::ReinitializeWindow)
            }
            SET_JOINT_POS => self.decode_override(address, args, ChannelKind::Position, OverrideMode::Set),
            CHANGE_JOINT_POS => {
                self.decode_override(address, args, ChannelKind::Position, OverrideMode::Change)
            }
            SET_JOINT_ROT => self.decode_override(address, args, ChannelKind::Rotation, OverrideMode::Set),
            CHANGE_JOINT_ROT => {
                self.decode_override(address, args, ChannelKind::Rotation, OverrideMode::Change)
            }
            _ => Err(SynthError::malformed(address, "unknown address")),
        }
    }

    /// `[j, v...]` targets one joint, `[j1, ..., jN, v...]` broadcasts `v` to N joints
    fn decode_override(
        &self,
        address: &str,
        args: &[ArgValue],
        channel: ChannelKind,
        mode: OverrideMode,
    ) -> Result<ControlCommand, SynthError> {
        if channel != self.channel {
            return Err(SynthError::malformed(
                address,
                format!("skeleton carries {:?} channels", self.channel),
            ));
        }

        let width = self.value_width();
        if args.len() <= width {
            return Err(SynthError::malformed(
                address,
                format!(
                    "expected at least {} arguments (joint index + {width} values), got {}",
                    width + 1,
                    args.len()
                ),
            ));
        }

        let split = args.len() - width;
        if let Some(legacy) = four_value_split(channel, width, args.len()) {
            debug!(
                address,
                joints = split,
                legacy_joints = legacy,
                "multi-joint position command splits differently under the four-value layout"
            );
        }
        let joint_indices = args[..split]
            .iter()
            .map(|arg| index_arg(address, arg))
            .collect::<Result<Vec<_>, _>>()?;
        let values = args[split..]
            .iter()
            .map(|arg| number_arg(address, arg))
            .collect::<Result<Vec<_>, _>>()?;

        let value = match channel {
            ChannelKind::Position => PoseValue::Vector { values },
            ChannelKind::Rotation => PoseValue::AxisAngle {
                axis: [values[0], values[1], values[2]],
                angle: values[3],
            },
        };

        Ok(ControlCommand::Override(JointOverride::new(
            joint_indices,
            value,
            mode,
        )))
    }
}

/// Joint count a 3-channel position command would get if the last four
/// arguments were always taken as the value (older senders assume this)
///
/// `None` when both layouts agree on the split.
pub(crate) fn four_value_split(channel: ChannelKind, width: usize, len: usize) -> Option<usize> {
    let multi_joint = len > width + 1;
    (channel == ChannelKind::Position && width == 3 && multi_joint).then(|| len - 4)
}

fn expect_len(address: &str, args: &[ArgValue], expected: usize) -> Result<(), SynthError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(SynthError::malformed(
            address,
            format!("expected {expected} arguments, got {}", args.len()),
        ))
    }
}

fn index_arg(address: &str, arg: &ArgValue) -> Result<i64, SynthError> {
    arg.as_index()
        .ok_or_else(|| SynthError::malformed(address, format!("{arg:?} is not an integer")))
}

fn number_arg(address: &str, arg: &ArgValue) -> Result<f32, SynthError> {
    arg.as_f32()
        .ok_or_else(|| SynthError::malformed(address, format!("{arg:?} is not a number")))
}
