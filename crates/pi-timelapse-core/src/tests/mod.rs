mod capture;
mod live_view;
mod persist;
mod session;
mod still;
