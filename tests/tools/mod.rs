mod lambert;
mod roots;
