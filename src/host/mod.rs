//! Demonstration host adapters: everything needed to run the convolution
//! core against real audio I/O, but none of it is part of the core library
//! contract (`convolution::ConvolutionManager` takes plain buffers and knows
//! nothing about JACK, WAV files, or the filesystem).

pub mod jack_adapter;
pub mod wav;
