mod guard;
mod pipeline;
