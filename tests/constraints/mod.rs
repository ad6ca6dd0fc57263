//! Parameter limits, fixed and tied parameters, and per-iteration step caps.

mod ties;
