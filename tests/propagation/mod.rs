mod conic;
mod events;
mod integrator;
