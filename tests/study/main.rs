mod journal;
mod tpe;
mod workflow;
