mod compile;
mod pipeline;
mod support;
